use std::path::PathBuf;

use image::{RgbImage, RgbaImage};
use serde::Serialize;

use super::ops::Mask;
use crate::composite::{alpha_cutout, black_cutout};
use crate::error::Result;
use crate::segmentation::MaskCandidate;
use crate::storage::{candidate_names, ArtifactStore};

/// Which optional artifacts accompany each candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Cutout with alpha `255 - mask`.
    pub inverted: bool,
    /// Opaque cutout with everything outside the mask black.
    pub black: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            inverted: true,
            black: false,
        }
    }
}

/// A candidate brought to source resolution, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct RenderedCandidate {
    pub index: usize,
    pub score: f32,
    pub mask: Mask,
    pub cutout: RgbaImage,
    pub inverted: Option<RgbaImage>,
    pub black: Option<RgbImage>,
}

/// Paths written for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateArtifacts {
    pub index: usize,
    pub score: f32,
    pub mask: PathBuf,
    pub cutout: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverted: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black: Option<PathBuf>,
}

/// Resizes, binarizes and exports candidate masks with their cutouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateMaskManager {
    options: ExportOptions,
}

impl CandidateMaskManager {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Bring one candidate to the extent of `original` and build its cutouts.
    pub fn render(
        &self,
        candidate: &MaskCandidate,
        original: &RgbImage,
    ) -> Result<RenderedCandidate> {
        // Nearest-neighbour resize, then threshold again even if already binary.
        let resized = candidate.mask().resized(original.dimensions().into())?;
        let mask = Mask::from_gray(resized.into_gray());

        // Cutouts share the re-binarized mask
        let cutout = alpha_cutout(original, &mask)?;
        let inverted = if self.options.inverted {
            Some(alpha_cutout(original, &mask.inverted())?)
        } else {
            None
        };
        let black = if self.options.black {
            Some(black_cutout(original, &mask)?)
        } else {
            None
        };

        Ok(RenderedCandidate {
            index: candidate.index(),
            score: candidate.score(),
            mask,
            cutout,
            inverted,
            black,
        })
    }

    /// Export every candidate in input order.
    ///
    /// File names are derived from `prefix` and the candidate index only, so
    /// exporting the same list twice writes the same files.
    pub fn export(
        &self,
        candidates: &[MaskCandidate],
        original: &RgbImage,
        store: &ArtifactStore,
        prefix: &str,
    ) -> Result<Vec<CandidateArtifacts>> {
        let _span = tracing::debug_span!("export_candidates", count = candidates.len()).entered();

        candidates
            .iter()
            .map(|candidate| {
                let rendered = self.render(candidate, original)?;
                let names = candidate_names(prefix, rendered.index);

                let mask = store.save(rendered.mask.as_gray(), &names.mask)?;
                let cutout = store.save(&rendered.cutout, &names.cutout)?;
                let inverted = rendered
                    .inverted
                    .as_ref()
                    .map(|img| store.save(img, &names.inverted))
                    .transpose()?;
                let black = rendered
                    .black
                    .as_ref()
                    .map(|img| store.save(img, &names.black))
                    .transpose()?;

                Ok(CandidateArtifacts {
                    index: rendered.index,
                    score: rendered.score,
                    mask,
                    cutout,
                    inverted,
                    black,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Extent;
    use image::{GrayImage, Luma, Rgb};

    fn source() -> RgbImage {
        RgbImage::from_fn(40, 30, |x, y| Rgb([x as u8 * 5, y as u8 * 7, 99]))
    }

    fn candidate(index: usize) -> MaskCandidate {
        // Low resolution mask: left half set.
        let gray = GrayImage::from_fn(8, 8, |x, _| Luma([if x < 4 { 255 } else { 0 }]));
        MaskCandidate::new(index, Mask::from_gray(gray), 0.8)
    }

    #[test]
    fn render_resizes_to_source_and_stays_binary() {
        let rendered = CandidateMaskManager::default()
            .render(&candidate(0), &source())
            .unwrap();
        assert_eq!(rendered.mask.extent(), Extent::new(40, 30));
        assert!(rendered.mask.as_gray().pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(rendered.mask.is_set(0, 0));
        assert!(!rendered.mask.is_set(39, 29));

        let inverted = rendered.inverted.unwrap();
        for (a, b) in rendered.cutout.pixels().zip(inverted.pixels()) {
            assert_eq!(u16::from(a[3]) + u16::from(b[3]), 255);
            assert_eq!(&a.0[..3], &b.0[..3]);
        }
        assert!(rendered.black.is_none());
    }

    #[test]
    fn export_is_index_named_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let manager = CandidateMaskManager::new(ExportOptions {
            inverted: true,
            black: true,
        });
        let candidates = vec![candidate(0), candidate(1)];

        let first = manager.export(&candidates, &source(), &store, "result_cat").unwrap();
        let bytes: Vec<Vec<u8>> = first.iter().map(|a| std::fs::read(&a.mask).unwrap()).collect();
        let second = manager.export(&candidates, &source(), &store, "result_cat").unwrap();

        assert_eq!(first, second);
        assert_eq!(first[1].mask, dir.path().join("result_cat_1_mask.png"));
        assert_eq!(first[1].cutout, dir.path().join("result_cat_1.png"));
        assert_eq!(
            first[0].inverted.as_deref(),
            Some(dir.path().join("result_cat_0_inverted.png").as_path())
        );
        assert_eq!(
            first[0].black.as_deref(),
            Some(dir.path().join("result_cat_0_black.png").as_path())
        );
        for (artifact, before) in second.iter().zip(bytes) {
            assert_eq!(std::fs::read(&artifact.mask).unwrap(), before);
        }
    }

    #[test]
    fn exporting_an_exported_mask_reproduces_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let manager = CandidateMaskManager::default();

        let first = manager.export(&[candidate(0)], &source(), &store, "once").unwrap();
        let reloaded = Mask::from_image(&store.open(&first[0].mask).unwrap());
        let again = manager
            .export(&[MaskCandidate::new(0, reloaded, 0.8)], &source(), &store, "twice")
            .unwrap();

        assert_eq!(
            std::fs::read(&first[0].mask).unwrap(),
            std::fs::read(&again[0].mask).unwrap()
        );
    }
}
