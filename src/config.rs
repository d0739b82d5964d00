//! Runtime configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::binding::RenameRule;
use crate::error::{Error, Result};
use crate::mask::ExportOptions;
use crate::prompt::{Extent, DEFAULT_ORIGINAL_EXTENT, MAX_POINTS_PER_LABEL};
use crate::style::{BackendVariant, InputMode, StyleSpec, DEFAULT_WORKING_SIZE};

/// Segmentation model files and decoding parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub encoder: PathBuf,
    pub decoder: PathBuf,
    /// Side of the square model input, which is also the prompt
    /// coordinate space.
    pub input_size: u32,
    /// Mask logit threshold.
    pub mask_threshold: f32,
    /// Rename rules applied to the decoder's declared input names.
    pub decoder_rules: Vec<RenameRule>,
    /// Ask the model for several candidates per prompt.
    pub multimask: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            encoder: PathBuf::from("resource/sam_vit_b_encoder.onnx"),
            decoder: PathBuf::from("resource/sam_vit_b_decoder.onnx"),
            input_size: 1024,
            mask_threshold: 0.0,
            decoder_rules: Vec::new(),
            multimask: true,
        }
    }
}

/// Configuration for the segmentation and stylization pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding uploads and every exported artifact.
    pub upload_dir: PathBuf,

    /// Original extent assumed when a prompt omits `original_size`.
    pub default_original_size: Extent,

    /// Per-label point limit.
    pub max_points_per_label: usize,

    /// Export the inverted cutout for each candidate.
    pub export_inverted: bool,

    /// Export the black-background cutout for each candidate.
    pub export_black: bool,

    pub segmentation: SegmentationConfig,

    pub styles: Vec<StyleSpec>,

    /// Style used when a request names an unknown style.
    pub default_style: String,
}

impl Default for Config {
    fn default() -> Self {
        let style = |id: &str, file: &str, variant| StyleSpec {
            id: id.to_string(),
            model: PathBuf::from("checkpoints").join(file),
            variant,
            input: InputMode::Rgb,
            working_size: DEFAULT_WORKING_SIZE,
            structure: false,
            dark_boost: false,
            equalize: false,
        };

        // Luminance generator with the full pre and post passes
        let cartoon = StyleSpec {
            input: InputMode::Luminance,
            structure: true,
            dark_boost: true,
            equalize: true,
            ..style("cartoon", "Hayao_net_G.onnx", BackendVariant::FullFrame)
        };

        Self {
            upload_dir: PathBuf::from("static/uploads"),
            default_original_size: DEFAULT_ORIGINAL_EXTENT,
            max_points_per_label: MAX_POINTS_PER_LABEL,
            export_inverted: true,
            export_black: false,
            segmentation: SegmentationConfig::default(),
            styles: vec![
                style("hayao", "Hayao_net_G.onnx", BackendVariant::Region),
                style("shinkai", "Shinkai_net_G.onnx", BackendVariant::Region),
                style("animegan2", "AnimeGANv2.onnx", BackendVariant::FullFrame),
                cartoon,
            ],
            default_style: "hayao".to_string(),
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_original_size.is_empty() {
            return Err(Error::Config(format!(
                "default_original_size must be positive, got {}",
                self.default_original_size
            )));
        }
        if self.segmentation.input_size == 0 {
            return Err(Error::Config(
                "segmentation.input_size must be positive".into(),
            ));
        }
        if self.styles.is_empty() {
            return Err(Error::Config("at least one style is required".into()));
        }

        let mut seen = HashSet::new();
        for style in &self.styles {
            if style.id.is_empty() {
                return Err(Error::Config("style id must not be empty".into()));
            }
            if !seen.insert(style.id.as_str()) {
                return Err(Error::Config(format!("style {} defined twice", style.id)));
            }
            if style.working_size == 0 {
                return Err(Error::Config(format!(
                    "style {} has a zero working size",
                    style.id
                )));
            }
        }
        if !seen.contains(self.default_style.as_str()) {
            return Err(Error::Config(format!(
                "default style {} is not defined",
                self.default_style
            )));
        }
        Ok(())
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            inverted: self.export_inverted,
            black: self.export_black,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.default_original_size, Extent::new(1024, 1024));
        assert_eq!(config.segmentation.input_size, 1024);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "upload_dir": "/srv/uploads",
                "default_original_size": {"width": 640, "height": 480},
                "segmentation": {
                    "decoder_rules": [{"kind": "strip-suffix", "suffix": ".1"}]
                },
                "styles": [
                    {"id": "paprika", "model": "w/paprika.onnx", "variant": "full-frame"}
                ],
                "default_style": "paprika"
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.default_original_size, Extent::new(640, 480));
        assert_eq!(config.segmentation.input_size, 1024);
        assert_eq!(
            config.segmentation.decoder_rules,
            vec![RenameRule::StripSuffix {
                suffix: ".1".into()
            }]
        );
        assert_eq!(config.styles[0].input, InputMode::Rgb);
        assert_eq!(config.styles[0].working_size, DEFAULT_WORKING_SIZE);
        assert!(config.export_inverted);
        assert!(!config.styles[0].dark_boost && !config.styles[0].structure);
    }

    #[test]
    fn default_cartoon_style_runs_every_pass() {
        let config = Config::default();
        let cartoon = config.styles.iter().find(|s| s.id == "cartoon").unwrap();
        assert_eq!(cartoon.input, InputMode::Luminance);
        assert!(cartoon.structure && cartoon.dark_boost && cartoon.equalize);
    }

    #[test]
    fn inconsistent_styles_are_rejected() {
        let mut config = Config::default();
        config.default_style = "missing".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        let dup = config.styles[0].clone();
        config.styles.push(dup);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.styles.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = Config::load("/nonexistent/regionstyle.json").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
