//! Supported streaming platforms.

use serde::{Deserialize, Serialize};

/// External streaming platform identifier.
///
/// Stored as TEXT (`ZOOM`, `FACEBOOK`, `INSTAGRAM`) in persistence and wire
/// payloads.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Zoom,
    Facebook,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zoom => "ZOOM",
            Self::Facebook => "FACEBOOK",
            Self::Instagram => "INSTAGRAM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ZOOM" => Some(Self::Zoom),
            "FACEBOOK" => Some(Self::Facebook),
            "INSTAGRAM" => Some(Self::Instagram),
            _ => None,
        }
    }
}
