//! Stylization backends and the dispatcher that recomposites their output.

mod backend;
mod dispatch;
mod network;
mod registry;
pub mod types;

pub use backend::GeneratorBackend;
pub use dispatch::{StyleDispatcher, StyleOutcome};
pub use network::OnnxStyleNetwork;
pub use registry::{Resolved, StyleRegistry, StyleSpec, DEFAULT_WORKING_SIZE};
pub use types::{BackendVariant, InputMode, Region, StyleBackend, StyleNetwork};
