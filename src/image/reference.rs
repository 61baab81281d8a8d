//! Parsed `name:tag` image references
//!
//! A tag uniquely identifies the artifact version baked into the image;
//! rebuilding under the same tag overwrites the mapping (last-write-wins),
//! which is allowed and is how redeploys of a fixed tag work.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pattern for a valid image/instance name component (Docker rules)
const NAME_PATTERN: &str = r"^[a-z0-9]+(?:[._\-/][a-z0-9]+)*$";

/// Pattern for a valid tag component
const TAG_PATTERN: &str = r"^[A-Za-z0-9_][A-Za-z0-9_.\-]{0,127}$";

/// Errors from parsing or constructing an image reference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRefError {
    #[error("image reference is empty")]
    Empty,

    #[error("invalid image name '{0}': lowercase alphanumerics separated by '.', '_', '-' or '/'")]
    InvalidName(String),

    #[error("invalid image tag '{0}': up to 128 alphanumerics, '.', '_' or '-'")]
    InvalidTag(String),
}

/// A `name:tag` pair identifying one image in the local registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    /// Constructs a validated reference from separate name and tag parts.
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Result<Self, ImageRefError> {
        let name = name.into();
        let tag = tag.into();

        if !matches_pattern(NAME_PATTERN, &name) {
            return Err(ImageRefError::InvalidName(name));
        }
        if !matches_pattern(TAG_PATTERN, &tag) {
            return Err(ImageRefError::InvalidTag(tag));
        }

        Ok(Self { name, tag })
    }

    /// The full `name:tag` string as the engine expects it.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = ImageRefError;

    /// Parses `name:tag`; a missing tag defaults to `latest`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ImageRefError::Empty);
        }

        match s.rsplit_once(':') {
            Some((name, tag)) => Self::new(name, tag),
            None => Self::new(s, "latest"),
        }
    }
}

/// Checks whether an instance name is safe to hand to the engine.
pub fn is_valid_instance_name(name: &str) -> bool {
    matches_pattern(NAME_PATTERN, name)
}

fn matches_pattern(pattern: &str, value: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}
