//! Transport-agnostic request and response bodies.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mask::CandidateArtifacts;
use crate::prompt::{Extent, Point, PromptMode};
use crate::style::Region;

/// Prompt submission in UI coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub foreground: Vec<Point>,
    #[serde(default)]
    pub background: Vec<Point>,
    /// Two opposite corners, in any order.
    #[serde(default, rename = "box")]
    pub bbox: Option<Vec<Point>>,
    pub filename: Option<String>,
    /// Extent the UI coordinates refer to.
    #[serde(default)]
    pub original_size: Option<Extent>,
}

impl PromptRequest {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::validation(format!("malformed prompt: {e}")))
    }

    pub fn filename(&self) -> Result<&str> {
        required(self.filename.as_deref(), "filename")
    }

    /// The box corners, if a box was sent. An empty list counts as no box.
    pub fn corners(&self) -> Result<Option<(Point, Point)>> {
        match self.bbox.as_deref() {
            None | Some([]) => Ok(None),
            Some([a, b]) => Ok(Some((*a, *b))),
            Some(other) => Err(Error::validation(format!(
                "box needs exactly two corners, got {}",
                other.len()
            ))),
        }
    }
}

/// Style submission referencing a previously exported mask.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSubmission {
    pub mask_path: Option<String>,
    pub filename: Option<String>,
    pub region: Option<String>,
    pub style_id: Option<String>,
}

/// A [`StyleSubmission`] with every field present and parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRequest<'a> {
    pub mask_path: &'a str,
    pub filename: &'a str,
    pub region: Region,
    pub style_id: &'a str,
}

impl StyleSubmission {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::validation(format!("malformed style submission: {e}")))
    }

    /// Check required fields. Unknown style ids are not rejected here; they
    /// fall back to the default backend at dispatch.
    pub fn validate(&self) -> Result<StyleRequest<'_>> {
        Ok(StyleRequest {
            mask_path: required(self.mask_path.as_deref(), "mask_path")?,
            filename: required(self.filename.as_deref(), "filename")?,
            region: required(self.region.as_deref(), "region")?.parse()?,
            style_id: required(self.style_id.as_deref(), "style_id")?,
        })
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::validation(format!("missing {field}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentResponse {
    pub message: String,
    /// Cutout paths in candidate order.
    pub result: Vec<PathBuf>,
    pub mode: PromptMode,
    pub candidates: Vec<CandidateArtifacts>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleResponse {
    pub message: String,
    pub result: PathBuf,
    /// Style id as requested.
    pub style_id: String,
    /// Backend that actually produced the result.
    pub backend: String,
    pub fallback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_fields_default_when_absent() {
        let req = PromptRequest::from_json(r#"{"filename": "cat.png", "box": []}"#).unwrap();
        assert!(req.foreground.is_empty());
        assert_eq!(req.corners().unwrap(), None);
        assert_eq!(req.original_size, None);
        assert_eq!(req.filename().unwrap(), "cat.png");
    }

    #[test]
    fn box_corners_are_taken_as_sent() {
        let req = PromptRequest::from_json(
            r#"{
                "foreground": [{"x": 10, "y": 10}],
                "box": [{"x": 80, "y": 80}, {"x": 20, "y": 20}],
                "filename": "cat.png",
                "original_size": {"width": 100, "height": 100}
            }"#,
        )
        .unwrap();
        assert_eq!(
            req.corners().unwrap(),
            Some((Point::new(80, 80), Point::new(20, 20)))
        );
        assert_eq!(req.original_size, Some(Extent::new(100, 100)));
    }

    #[test]
    fn malformed_prompts_are_validation_errors() {
        assert!(matches!(
            PromptRequest::from_json(r#"{"foreground": [{"x": -1, "y": 0}]}"#),
            Err(Error::Validation(_))
        ));

        let req = PromptRequest {
            bbox: Some(vec![Point::new(1, 1)]),
            ..Default::default()
        };
        assert!(req.corners().is_err());
        assert!(req.filename().is_err());
    }

    #[test]
    fn style_submission_requires_every_field() {
        let full = StyleSubmission::from_json(
            r#"{"mask_path": "static/uploads/result_cat_0_mask.png",
                "filename": "cat.png", "region": "background", "style_id": "hayao"}"#,
        )
        .unwrap();
        let req = full.validate().unwrap();
        assert_eq!(req.region, Region::Background);
        assert_eq!(req.style_id, "hayao");

        let mut missing = full.clone();
        missing.mask_path = None;
        assert!(matches!(missing.validate(), Err(Error::Validation(_))));

        let mut blank = full.clone();
        blank.style_id = Some("  ".into());
        assert!(blank.validate().is_err());

        let mut bad_region = full;
        bad_region.region = Some("sky".into());
        assert!(matches!(bad_region.validate(), Err(Error::Validation(_))));
    }
}
