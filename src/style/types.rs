use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::prompt::Extent;

/// Which side of the mask a style request changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Foreground,
    Background,
}

impl Region {
    /// Compositing under the mask's complement is what leaves the
    /// foreground untouched.
    pub fn inverts_mask(self) -> bool {
        matches!(self, Self::Background)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Foreground => "foreground",
            Self::Background => "background",
        })
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "foreground" => Ok(Self::Foreground),
            "background" => Ok(Self::Background),
            other => Err(Error::validation(format!(
                "region must be foreground or background, got {other:?}"
            ))),
        }
    }
}

/// How much of the source a backend sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendVariant {
    /// The whole source image; masking happens only at composite time.
    FullFrame,
    /// Only the pixels of the region being restyled, the rest zeroed.
    Region,
}

/// What the network receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputMode {
    /// Colour input, colour output.
    #[default]
    Rgb,
    /// Luma replicated over three channels; the output's channel mean
    /// replaces the source luma and the source chroma is kept.
    Luminance,
}

/// A generative network with a fixed working resolution.
///
/// Inputs are `[1, 3, H, W]` tensors in `[-1, 1]`; outputs have the same
/// shape and range.
pub trait StyleNetwork: Send + Sync {
    fn working_size(&self) -> Extent;

    fn run(&self, input: Array4<f32>) -> Result<Array4<f32>>;
}

/// Trait for stylization backends
///
/// Implementations may resample internally but always return an image of
/// the input's extent. Backends are immutable after construction and are
/// shared across requests.
pub trait StyleBackend: Send + Sync {
    fn name(&self) -> &str;

    fn variant(&self) -> BackendVariant;

    fn stylize(&self, image: &RgbImage) -> Result<RgbImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_round_trips_through_text() {
        for region in [Region::Foreground, Region::Background] {
            assert_eq!(region.to_string().parse::<Region>().unwrap(), region);
        }
        assert!(matches!(
            "sky".parse::<Region>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn only_background_inverts() {
        assert!(!Region::Foreground.inverts_mask());
        assert!(Region::Background.inverts_mask());
    }

    #[test]
    fn variant_names_are_kebab_case() {
        let v: BackendVariant = serde_json::from_str("\"full-frame\"").unwrap();
        assert_eq!(v, BackendVariant::FullFrame);
        let m: InputMode = serde_json::from_str("\"luminance\"").unwrap();
        assert_eq!(m, InputMode::Luminance);
    }
}
