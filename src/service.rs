//! Request-level entry points tying the pipeline stages together.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::mask::CandidateMaskManager;
use crate::prompt::{CoordinateMapper, PromptBuilder};
use crate::request::{PromptRequest, SegmentResponse, StyleResponse, StyleSubmission};
use crate::segmentation::{self, SegmentationOracle, SharedOracle};
use crate::storage::{result_prefix, stylized_name, validate_upload_name, ArtifactStore};
use crate::style::{StyleDispatcher, StyleRegistry};

/// Segmentation and stylization over one artifact directory.
///
/// Safe to share between threads: the oracle is locked per call and style
/// backends are read-only once loaded.
pub struct Studio {
    store: ArtifactStore,
    mapper: CoordinateMapper,
    builder: PromptBuilder,
    oracle: SharedOracle,
    exporter: CandidateMaskManager,
    dispatcher: StyleDispatcher,
    multimask: bool,
}

impl Studio {
    pub fn new(
        config: &Config,
        oracle: Box<dyn SegmentationOracle>,
        registry: StyleRegistry,
    ) -> Result<Self> {
        registry.check_default()?;
        let store = ArtifactStore::new(&config.upload_dir);
        store.ensure()?;

        let oracle = SharedOracle::new(oracle);
        let mapper = CoordinateMapper::new(oracle.input_size())
            .with_default_original(config.default_original_size);

        Ok(Self {
            store,
            mapper,
            builder: PromptBuilder::new(config.max_points_per_label),
            oracle,
            exporter: CandidateMaskManager::new(config.export_options()),
            dispatcher: StyleDispatcher::new(Arc::new(registry)),
            multimask: config.segmentation.multimask,
        })
    }

    /// Load the segmentation model and register every configured style.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let oracle = segmentation::create_default_model(&config.segmentation)?;
        let registry = StyleRegistry::from_specs(&config.styles, &config.default_style)?;
        Self::new(config, oracle, registry)
    }

    pub fn registry(&self) -> &StyleRegistry {
        self.dispatcher.registry()
    }

    /// Segment an uploaded image from UI-space prompts and export every
    /// candidate.
    pub fn segment(&self, request: &PromptRequest) -> Result<SegmentResponse> {
        let filename = request.filename()?;
        validate_upload_name(filename)?;
        let _span = tracing::info_span!("segment", file = filename).entered();

        let original = request.original_size;
        let foreground = self.mapper.map_points(&request.foreground, original)?;
        let background = self.mapper.map_points(&request.background, original)?;
        let bbox = request
            .corners()?
            .map(|(a, b)| self.mapper.map_box(a, b, original))
            .transpose()?;
        let prompt = self.builder.build(&foreground, &background, bbox)?;
        let mode = prompt.mode();

        let source = self.store.load_source(filename)?;
        let candidates = self.oracle.segment_image(&source, &prompt, self.multimask)?;
        // Export every candidate at source resolution
        let artifacts =
            self.exporter
                .export(&candidates, &source, &self.store, &result_prefix(filename))?;

        let message = format!(
            "Segmentation completed using [{mode}], {} results generated.",
            artifacts.len()
        );
        tracing::info!("{message}");

        Ok(SegmentResponse {
            message,
            result: artifacts.iter().map(|a| a.cutout.clone()).collect(),
            mode,
            candidates: artifacts,
        })
    }

    /// Restyle one region of an uploaded image under an exported mask.
    pub fn stylize(&self, submission: &StyleSubmission) -> Result<StyleResponse> {
        let request = submission.validate()?;
        validate_upload_name(request.filename)?;
        let _span = tracing::info_span!("stylize", file = request.filename).entered();

        let source = self.store.load_source(request.filename)?;
        let mask_path = self.store.resolve(request.mask_path)?;
        let mask = self.store.open(&mask_path)?;

        let outcome = self
            .dispatcher
            .dispatch(request.style_id, request.region, &source, &mask)?;
        let name = stylized_name(&outcome.backend, request.region, request.filename);
        let result = self.store.save(&outcome.image, &name)?;

        let message = if outcome.fallback {
            format!(
                "Unrecognized style {:?}, used {} instead.",
                request.style_id, outcome.backend
            )
        } else {
            format!("Applied {} to the {}.", outcome.backend, request.region)
        };

        Ok(StyleResponse {
            message,
            result,
            style_id: request.style_id.to_string(),
            backend: outcome.backend,
            fallback: outcome.fallback,
        })
    }
}
