//! Expected wait windows per model
//!
//! Advisory only: these numbers feed progress messages and never change how
//! many attempts are made or how long the gateway sleeps.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long a cold model usually takes to become ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedWaitWindow {
    pub min_seconds: u64,
    pub max_seconds: u64,
}

impl ExpectedWaitWindow {
    pub const fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            min_seconds,
            max_seconds,
        }
    }

    /// Window used for model keys missing from the table
    pub const DEFAULT: ExpectedWaitWindow = ExpectedWaitWindow::new(15, 45);

    /// Lookup by model key (case-insensitive), falling back to [`Self::DEFAULT`]
    pub fn for_model(model_key: &str) -> Self {
        let key = model_key.trim();
        KNOWN_MODELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, window)| *window)
            .unwrap_or(Self::DEFAULT)
    }

    pub fn is_known(model_key: &str) -> bool {
        let key = model_key.trim();
        KNOWN_MODELS
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(key))
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max_seconds)
    }

    /// User-facing message, e.g. "usually ready in 20-60 seconds"
    pub fn message(&self) -> String {
        format!("usually ready in {self}")
    }
}

impl Default for ExpectedWaitWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ExpectedWaitWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max_seconds >= 120 {
            let min = self.min_seconds.div_ceil(60).max(1);
            let max = self.max_seconds.div_ceil(60);
            write!(f, "{min}-{max} minutes")
        } else {
            write!(f, "{}-{} seconds", self.min_seconds, self.max_seconds)
        }
    }
}

/// Hosted models the assistant calls, with observed cold-start windows
const KNOWN_MODELS: &[(&str, ExpectedWaitWindow)] = &[
    // text
    (
        "mistralai/Mistral-7B-Instruct-v0.2",
        ExpectedWaitWindow::new(20, 60),
    ),
    (
        "meta-llama/Meta-Llama-3-8B-Instruct",
        ExpectedWaitWindow::new(30, 90),
    ),
    ("google/flan-t5-large", ExpectedWaitWindow::new(10, 30)),
    // image
    (
        "stabilityai/stable-diffusion-xl-base-1.0",
        ExpectedWaitWindow::new(30, 90),
    ),
    (
        "black-forest-labs/FLUX.1-schnell",
        ExpectedWaitWindow::new(20, 60),
    ),
    (
        "runwayml/stable-diffusion-v1-5",
        ExpectedWaitWindow::new(20, 60),
    ),
    // audio
    ("facebook/musicgen-small", ExpectedWaitWindow::new(30, 120)),
    ("openai/whisper-large-v3", ExpectedWaitWindow::new(20, 60)),
    (
        "espnet/kan-bayashi_ljspeech_vits",
        ExpectedWaitWindow::new(15, 45),
    ),
    // vision
    (
        "Salesforce/blip-image-captioning-large",
        ExpectedWaitWindow::new(10, 30),
    ),
    ("google/vit-base-patch16-224", ExpectedWaitWindow::new(5, 20)),
    // multimodal
    ("llava-hf/llava-1.5-7b-hf", ExpectedWaitWindow::new(30, 90)),
    // video
    (
        "ali-vilab/text-to-video-ms-1.7b",
        ExpectedWaitWindow::new(60, 180),
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_model_lookup() {
        assert_eq!(
            ExpectedWaitWindow::for_model("facebook/musicgen-small"),
            ExpectedWaitWindow::new(30, 120)
        );
        assert_eq!(
            ExpectedWaitWindow::for_model("FACEBOOK/MUSICGEN-SMALL"),
            ExpectedWaitWindow::new(30, 120)
        );
        assert!(ExpectedWaitWindow::is_known("google/vit-base-patch16-224"));
    }

    #[test]
    fn unknown_model_falls_back_to_default() {
        assert_eq!(
            ExpectedWaitWindow::for_model("someone/brand-new-model"),
            ExpectedWaitWindow::DEFAULT
        );
        assert!(!ExpectedWaitWindow::is_known("someone/brand-new-model"));
    }

    #[test]
    fn message_in_seconds() {
        assert_eq!(
            ExpectedWaitWindow::new(20, 60).message(),
            "usually ready in 20-60 seconds"
        );
    }

    #[test]
    fn long_windows_render_in_minutes() {
        assert_eq!(ExpectedWaitWindow::new(60, 180).to_string(), "1-3 minutes");
        assert_eq!(ExpectedWaitWindow::new(30, 120).to_string(), "1-2 minutes");
    }

    #[test]
    fn table_windows_are_ordered() {
        for (name, window) in KNOWN_MODELS {
            assert!(window.min_seconds <= window.max_seconds, "{name}");
        }
    }
}
