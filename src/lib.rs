//! # regionstyle
//!
//! Prompt-driven region selection and per-region restyling of photos.
//!
//! A user marks foreground and background points (and optionally a box) on an
//! image. A promptable segmentation model returns candidate masks, which are
//! exported at full resolution together with alpha cutouts. One candidate is
//! then used to restyle either the foreground or the background through a
//! generator network, and the result is recomposited so pixels outside the
//! chosen region are left exactly as they were.
//!
//! ## Example
//!
//! ```no_run
//! use regionstyle::{Config, PromptRequest, Studio};
//!
//! # fn main() -> regionstyle::Result<()> {
//! let config = Config::default();
//! let studio = Studio::from_config(&config)?;
//!
//! let request = PromptRequest::from_json(
//!     r#"{"foreground": [{"x": 10, "y": 10}], "filename": "cat.png"}"#,
//! )?;
//! let response = studio.segment(&request)?;
//! println!("{}", response.message);
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod composite;
pub mod config;
pub mod error;
pub mod mask;
pub mod preprocess;
pub mod prompt;
pub mod request;
pub mod segmentation;
pub mod service;
pub mod session;
pub mod storage;
pub mod style;

pub use config::Config;
pub use error::{Error, Result};
pub use request::{PromptRequest, SegmentResponse, StyleResponse, StyleSubmission};
pub use service::Studio;
pub use session::{Session, SessionState};
