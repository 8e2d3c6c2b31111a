use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Build generation number. The first generation is 1.
pub type Generation = u64;

/// What kind of asset a pipeline produces.
///
/// The kind decides how connected browsers are told about new output (see
/// [`crate::reload::policy`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[serde(alias = "style", alias = "styles")]
    Css,
    #[serde(alias = "markup")]
    Html,
    #[serde(alias = "script", alias = "scripts")]
    Js,
    #[serde(alias = "images")]
    Image,
    #[serde(alias = "fonts")]
    Font,
    #[default]
    Other,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Css => "css",
            AssetKind::Html => "html",
            AssetKind::Js => "js",
            AssetKind::Image => "image",
            AssetKind::Font => "font",
            AssetKind::Other => "other",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "css" | "style" | "styles" => Ok(AssetKind::Css),
            "html" | "markup" => Ok(AssetKind::Html),
            "js" | "script" | "scripts" => Ok(AssetKind::Js),
            "image" | "images" => Ok(AssetKind::Image),
            "font" | "fonts" => Ok(AssetKind::Font),
            "other" => Ok(AssetKind::Other),
            other => Err(format!(
                "invalid asset kind: {other} (expected css, html, js, image, font or other)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_kind_is_other() {
        assert_eq!(AssetKind::default(), AssetKind::Other);
    }

    #[test]
    fn aliases_parse_to_the_same_kind() {
        for raw in ["css", "Styles", " style "] {
            assert_eq!(raw.parse::<AssetKind>(), Ok(AssetKind::Css));
        }
        assert!("sass".parse::<AssetKind>().is_err());
    }
}
