//! One user's walk through segment, select and stylize.

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::mask::CandidateArtifacts;
use crate::request::{PromptRequest, SegmentResponse, StyleResponse, StyleSubmission};
use crate::service::Studio;
use crate::style::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Segmented,
    Selected,
    Styled,
}

impl SessionState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Segmented => "segmented",
            Self::Selected => "selected",
            Self::Styled => "styled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks `Idle -> Segmented -> Selected -> Styled`.
///
/// A new `segment` call is accepted in every state and starts over with the
/// new candidates. `stylize` may be repeated from `Styled` to try another
/// style or region on the same selection.
pub struct Session<'a> {
    studio: &'a Studio,
    state: SessionState,
    filename: Option<String>,
    candidates: Vec<CandidateArtifacts>,
    selected: Option<usize>,
    last: Option<StyleResponse>,
}

impl<'a> Session<'a> {
    pub fn new(studio: &'a Studio) -> Self {
        Self {
            studio,
            state: SessionState::Idle,
            filename: None,
            candidates: Vec::new(),
            selected: None,
            last: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn candidates(&self) -> &[CandidateArtifacts] {
        &self.candidates
    }

    pub fn last_result(&self) -> Option<&StyleResponse> {
        self.last.as_ref()
    }

    pub fn segment(&mut self, request: &PromptRequest) -> Result<SegmentResponse> {
        let response = self.studio.segment(request)?;
        self.filename = Some(request.filename()?.to_string());
        self.candidates = response.candidates.clone();
        self.selected = None;
        self.last = None;
        self.state = SessionState::Segmented;
        Ok(response)
    }

    /// Pick one exported candidate by index.
    pub fn select(&mut self, index: usize) -> Result<&CandidateArtifacts> {
        if self.state == SessionState::Idle {
            return Err(self.invalid("select"));
        }
        let position = self
            .candidates
            .iter()
            .position(|c| c.index == index)
            .ok_or_else(|| {
                Error::validation(format!(
                    "candidate {index} does not exist, {} were exported",
                    self.candidates.len()
                ))
            })?;
        self.selected = Some(position);
        self.state = SessionState::Selected;
        Ok(&self.candidates[position])
    }

    /// Mask artifact of the current selection.
    pub fn confirm(&self) -> Result<&Path> {
        match (self.state, self.selected) {
            (SessionState::Selected | SessionState::Styled, Some(position)) => {
                Ok(&self.candidates[position].mask)
            }
            _ => Err(self.invalid("confirm")),
        }
    }

    pub fn stylize(&mut self, region: Region, style_id: &str) -> Result<&StyleResponse> {
        let mask = self
            .confirm()
            .map_err(|_| self.invalid("stylize"))?
            .to_string_lossy()
            .into_owned();
        let submission = StyleSubmission {
            mask_path: Some(mask),
            filename: self.filename.clone(),
            region: Some(region.to_string()),
            style_id: Some(style_id.to_string()),
        };

        let response = self.studio.stylize(&submission)?;
        self.state = SessionState::Styled;
        Ok(self.last.insert(response))
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            action,
            state: self.state.as_str(),
        }
    }
}
