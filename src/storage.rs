//! On-disk artifact directory and the naming contract clients rely on.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, PixelWithColorType, RgbImage};

use crate::error::{Error, Result};
use crate::style::Region;

/// Upload extensions accepted for source images.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Every exported artifact is PNG so cutouts keep their alpha channel.
pub const ARTIFACT_EXT: &str = "png";

/// Names of the files exported for one mask candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNames {
    pub mask: String,
    pub cutout: String,
    pub inverted: String,
    pub black: String,
}

/// `P_i_mask`, `P_i`, `P_i_inverted` and `P_i_black`, all keyed by the
/// candidate index so repeated exports of the same list overwrite the same
/// files.
pub fn candidate_names(prefix: &str, index: usize) -> CandidateNames {
    CandidateNames {
        mask: format!("{prefix}_{index}_mask.{ARTIFACT_EXT}"),
        cutout: format!("{prefix}_{index}.{ARTIFACT_EXT}"),
        inverted: format!("{prefix}_{index}_inverted.{ARTIFACT_EXT}"),
        black: format!("{prefix}_{index}_black.{ARTIFACT_EXT}"),
    }
}

/// `stylized_<style>_<region>_<basename>.png`
pub fn stylized_name(style_id: &str, region: Region, source_filename: &str) -> String {
    format!(
        "stylized_{style_id}_{region}_{}.{ARTIFACT_EXT}",
        file_stem(source_filename)
    )
}

/// Artifact prefix for a source upload: `result_<stem>`.
pub fn result_prefix(source_filename: &str) -> String {
    format!("result_{}", file_stem(source_filename))
}

fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

/// Check that `filename` is a bare file name with an allowed extension.
pub fn validate_upload_name(filename: &str) -> Result<()> {
    validate_bare_name(filename)?;
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::validation(format!(
            "unsupported file type for {filename}, expected one of {ALLOWED_EXTENSIONS:?}"
        )));
    }
    Ok(())
}

fn validate_bare_name(name: &str) -> Result<()> {
    let bare = Path::new(name).file_name().and_then(|n| n.to_str());
    if name.is_empty() || bare != Some(name) || name == ".." {
        return Err(Error::validation(format!(
            "expected a plain file name, got {name:?}"
        )));
    }
    Ok(())
}

/// Directory holding uploads and every derived artifact.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory if it does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Locate an artifact referenced by a client.
    ///
    /// Clients echo back the paths they were given, so only the final
    /// component is honoured and it is always looked up inside the store.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let name = Path::new(reference)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::validation(format!("invalid artifact reference {reference:?}")))?;
        validate_bare_name(name)?;
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(Error::NotFound { path });
        }
        Ok(path)
    }

    /// Load a source upload as RGB.
    pub fn load_source(&self, filename: &str) -> Result<RgbImage> {
        validate_upload_name(filename)?;
        let path = self.resolve(filename)?;
        Ok(self.open(&path)?.to_rgb8())
    }

    pub fn open(&self, path: &Path) -> Result<DynamicImage> {
        image::open(path).map_err(|source| Error::ImageLoad {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Encode `image` under `name`, returning the written path.
    pub fn save<P>(&self, image: &ImageBuffer<P, Vec<u8>>, name: &str) -> Result<PathBuf>
    where
        P: PixelWithColorType<Subpixel = u8>,
    {
        validate_bare_name(name)?;
        let path = self.root.join(name);
        image.save(&path).map_err(|source| Error::ImageSave {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }
}
