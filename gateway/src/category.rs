//! Model categories
//!
//! A category selects the retry policy for an invocation. Parsing is total:
//! anything that is not a known category name maps to [`ModelCategory::Unknown`]
//! and therefore to the default policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Kind of model behind an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelCategory {
    Image,
    Audio,
    Text,
    Vision,
    Multimodal,
    Video,
    Unknown,
}

impl ModelCategory {
    /// Lowercase name used in config keys and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelCategory::Image => "image",
            ModelCategory::Audio => "audio",
            ModelCategory::Text => "text",
            ModelCategory::Vision => "vision",
            ModelCategory::Multimodal => "multimodal",
            ModelCategory::Video => "video",
            ModelCategory::Unknown => "unknown",
        }
    }

    /// Categories with a dedicated policy row, in table order
    pub fn known() -> [Self; 6] {
        [
            ModelCategory::Image,
            ModelCategory::Audio,
            ModelCategory::Text,
            ModelCategory::Vision,
            ModelCategory::Multimodal,
            ModelCategory::Video,
        ]
    }

    /// Strict parse, `None` for names outside the table.
    ///
    /// Config overrides use this so a typo is reported instead of silently
    /// landing on the default row.
    pub fn parse_known(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::known()
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(name))
    }
}

impl FromStr for ModelCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_known(s).unwrap_or(ModelCategory::Unknown))
    }
}

impl From<&str> for ModelCategory {
    fn from(value: &str) -> Self {
        Self::parse_known(value).unwrap_or(ModelCategory::Unknown)
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ModelCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ModelCategory::from(raw.as_str()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_known_names_case_insensitively() {
        assert_eq!(ModelCategory::from("image"), ModelCategory::Image);
        assert_eq!(ModelCategory::from("Audio"), ModelCategory::Audio);
        assert_eq!(ModelCategory::from(" VIDEO "), ModelCategory::Video);
        assert_eq!(
            "multimodal".parse::<ModelCategory>(),
            Ok(ModelCategory::Multimodal)
        );
    }

    #[test]
    fn unknown_names_fall_back() {
        assert_eq!(ModelCategory::from("3d"), ModelCategory::Unknown);
        assert_eq!(ModelCategory::from(""), ModelCategory::Unknown);
        assert_eq!(ModelCategory::parse_known("unknown"), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for category in ModelCategory::known() {
            assert_eq!(ModelCategory::from(category.to_string().as_str()), category);
        }
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ModelCategory::Vision).unwrap();
        assert_eq!(json, "\"vision\"");
        let parsed: ModelCategory = serde_json::from_str("\"speech\"").unwrap();
        assert_eq!(parsed, ModelCategory::Unknown);
    }
}
