use std::path::Path;

use image::{imageops, RgbImage};
use ndarray::{Array1, Array2, Array3, Array4, ArrayD, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::types::{rank_candidates, MaskCandidate, SegmentationOracle};
use crate::binding::{NameBinding, RenameRule};
use crate::error::{Error, Result};
use crate::mask::Mask;
use crate::preprocess::{Normalization, Preprocessor};
use crate::prompt::{Extent, Label, Prompt};

/// Canonical decoder inputs of an exported Segment Anything prompt decoder.
pub const DECODER_INPUTS: &[&str] = &[
    "image_embeddings",
    "point_coords",
    "point_labels",
    "mask_input",
    "has_mask_input",
    "orig_im_size",
];

/// Labels the decoder uses for box corners and for the padding point that
/// stands in for an absent box.
const BOX_TOP_LEFT: f32 = 2.0;
const BOX_BOTTOM_RIGHT: f32 = 3.0;
const PADDING_LABEL: f32 = -1.0;

/// Side of the low resolution mask prompt the decoder accepts.
const MASK_INPUT_SIZE: usize = 256;

/// Segment Anything split into an image encoder and a prompt decoder, both
/// ONNX.
///
/// The loaded image is stretched to a square `input_size` so prompt
/// coordinates map linearly into model space. Masks come back at that
/// resolution; callers resize them to the source image.
pub struct SegmentAnything {
    encoder: Session,
    decoder: Session,
    decoder_inputs: NameBinding,
    preprocessor: Preprocessor,
    input_size: u32,
    mask_threshold: f32,

    // Embedding of the currently loaded image
    embeddings: Option<Array4<f32>>,
}

impl SegmentAnything {
    /// Load encoder and decoder from ONNX files.
    ///
    /// # Arguments
    /// * `encoder_path` - image encoder
    /// * `decoder_path` - prompt decoder
    /// * `input_size` - square side the encoder expects (1024 for SAM)
    /// * `mask_threshold` - logit above which a mask pixel is set
    /// * `rules` - rename rules binding the decoder's declared input names
    pub fn new<P: AsRef<Path>>(
        encoder_path: P,
        decoder_path: P,
        input_size: u32,
        mask_threshold: f32,
        rules: &[RenameRule],
    ) -> Result<Self> {
        let encoder = load_session(encoder_path.as_ref())?;
        let decoder = load_session(decoder_path.as_ref())?;

        let declared: Vec<String> = decoder.inputs.iter().map(|i| i.name.clone()).collect();
        let decoder_inputs = NameBinding::bind("sam-decoder", &declared, DECODER_INPUTS, rules)?;

        let preprocessor = Preprocessor::new(input_size, input_size)
            .with_filter(imageops::FilterType::Triangle)
            .with_normalization(Normalization::IMAGENET);

        tracing::info!("Segment Anything loaded ({input_size}x{input_size} input)");

        Ok(Self {
            encoder,
            decoder,
            decoder_inputs,
            preprocessor,
            input_size,
            mask_threshold,
            embeddings: None,
        })
    }

    /// Point coordinates and labels in decoder layout.
    ///
    /// A box becomes two trailing corner points; without a box a padding
    /// point is appended instead.
    #[allow(clippy::cast_precision_loss)]
    fn encode_prompt(prompt: &Prompt) -> Result<(Array3<f32>, Array2<f32>)> {
        let mut coords: Vec<f32> = Vec::new();
        let mut labels: Vec<f32> = Vec::new();

        for (point, label) in prompt.points() {
            coords.extend([point.x as f32, point.y as f32]);
            labels.push(Label::value(*label));
        }

        match prompt.bbox() {
            Some(bbox) => {
                let (tl, br) = (bbox.top_left(), bbox.bottom_right());
                coords.extend([tl.x as f32, tl.y as f32, br.x as f32, br.y as f32]);
                labels.extend([BOX_TOP_LEFT, BOX_BOTTOM_RIGHT]);
            }
            None => {
                coords.extend([0.0, 0.0]);
                labels.push(PADDING_LABEL);
            }
        }

        prompt_arrays(coords, labels)
    }
}

/// Shape flat coordinates and labels as `[1, N, 2]` and `[1, N]`.
fn prompt_arrays(coords: Vec<f32>, labels: Vec<f32>) -> Result<(Array3<f32>, Array2<f32>)> {
    let n = labels.len();
    let coords =
        Array3::from_shape_vec((1, n, 2), coords).map_err(|e| Error::inference("decoder", e))?;
    let labels =
        Array2::from_shape_vec((1, n), labels).map_err(|e| Error::inference("decoder", e))?;
    Ok((coords, labels))
}

fn load_session(path: &Path) -> Result<Session> {
    let name = path.display().to_string();
    if !path.is_file() {
        return Err(Error::unavailable(name, "model file not found"));
    }

    tracing::info!("Loading ONNX model from {}", path.display());

    Session::builder()
        .map_err(|e| Error::unavailable(&name, e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| Error::unavailable(&name, e))?
        .with_intra_threads(4)
        .map_err(|e| Error::unavailable(&name, e))?
        .commit_from_file(path)
        .map_err(|e| Error::unavailable(&name, e))
}

fn tensor<D: ndarray::Dimension + 'static>(
    stage: &'static str,
    array: ndarray::Array<f32, D>,
) -> Result<Tensor<f32>> {
    Tensor::from_array(array).map_err(|e| Error::inference(stage, e))
}

/// Copy an output tensor into an owned dynamic array.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub(crate) fn extract(
    stage: &'static str,
    value: &ort::value::DynValue,
) -> Result<ArrayD<f32>> {
    let (shape, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|e| Error::inference(stage, e))?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
        .map_err(|e| Error::inference(stage, e))
}

impl SegmentationOracle for SegmentAnything {
    fn load_image(&mut self, image: &RgbImage) -> Result<()> {
        let _span = tracing::debug_span!("sam_encode").entered();

        let input = tensor("encoder", self.preprocessor.preprocess(image)?)?;

        // Run inference
        let outputs = self
            .encoder
            .run(ort::inputs![input])
            .map_err(|e| Error::inference("encoder", e))?;
        let embeddings = extract("encoder", &outputs[0])?
            .into_dimensionality()
            .map_err(|e| Error::inference("encoder", e))?;

        self.embeddings = Some(embeddings);
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn segment(&mut self, prompt: &Prompt, multimask: bool) -> Result<Vec<MaskCandidate>> {
        let _span = tracing::debug_span!("sam_decode", mode = %prompt.mode()).entered();

        let embeddings = self
            .embeddings
            .clone()
            .ok_or_else(|| Error::inference("decoder", "no image loaded"))?;

        let (coords, labels) = Self::encode_prompt(prompt)?;
        let side = self.input_size as f32;
        let names = &self.decoder_inputs;

        // No previous low-resolution mask is fed back
        let mask_input = Array4::<f32>::zeros((1, 1, MASK_INPUT_SIZE, MASK_INPUT_SIZE));

        // Run inference
        let inputs = ort::inputs![
            names.name("image_embeddings") => tensor("decoder", embeddings)?,
            names.name("point_coords") => tensor("decoder", coords)?,
            names.name("point_labels") => tensor("decoder", labels)?,
            names.name("mask_input") => tensor("decoder", mask_input)?,
            names.name("has_mask_input") => tensor("decoder", Array1::<f32>::zeros(1))?,
            names.name("orig_im_size") => tensor("decoder", Array1::from(vec![side, side]))?
        ];

        let outputs = self
            .decoder
            .run(inputs)
            .map_err(|e| Error::inference("decoder", e))?;

        // masks: [1, K, H, W], iou_predictions: [1, K]
        let masks = extract("decoder", &outputs[0])?;
        let scores = extract("decoder", &outputs[1])?;
        drop(outputs);

        let shape = masks.shape().to_vec();
        if shape.len() != 4 || scores.len() != shape[1] {
            return Err(Error::inference(
                "decoder",
                format!("unexpected output shapes {shape:?} and {:?}", scores.shape()),
            ));
        }
        let (count, height, width) = (shape[1], shape[2], shape[3]);
        let plane = height * width;
        let flat: Vec<f32> = masks.iter().copied().collect();

        // Threshold each logit plane into a binary mask

        let raw = (0..count)
            .map(|k| {
                let mask = Mask::from_scores(
                    &flat[k * plane..(k + 1) * plane],
                    width as u32,
                    height as u32,
                    self.mask_threshold,
                )?;
                Ok((mask, scores.as_slice().map_or(0.0, |s| s[k])))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Decoder produced {count} masks");
        Ok(rank_candidates(raw, multimask))
    }

    fn reset_state(&mut self) {
        tracing::debug!("Dropping cached image embeddings");
        self.embeddings = None;
    }

    fn input_size(&self) -> Extent {
        Extent::new(self.input_size, self.input_size)
    }
}
