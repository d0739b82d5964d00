use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::backend::GeneratorBackend;
use super::network::OnnxStyleNetwork;
use super::types::{BackendVariant, InputMode, StyleBackend};
use crate::error::{Error, Result};
use crate::prompt::Extent;

/// Working resolution of the bundled generators.
pub const DEFAULT_WORKING_SIZE: u32 = 256;

/// Declarative description of one style backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSpec {
    pub id: String,
    pub model: PathBuf,
    pub variant: BackendVariant,
    #[serde(default)]
    pub input: InputMode,
    #[serde(default = "default_working_size")]
    pub working_size: u32,
    /// Edge-preserving filter over the input before inference.
    #[serde(default)]
    pub structure: bool,
    /// Lift dark source regions with a contrast-limited equalization blend.
    #[serde(default)]
    pub dark_boost: bool,
    #[serde(default)]
    pub equalize: bool,
}

fn default_working_size() -> u32 {
    DEFAULT_WORKING_SIZE
}

impl StyleSpec {
    /// Load the weights and build the described backend.
    pub fn build(&self) -> Result<Arc<dyn StyleBackend>> {
        let network = OnnxStyleNetwork::load(
            &self.id,
            &self.model,
            Extent::new(self.working_size, self.working_size),
        )?;
        let backend = GeneratorBackend::new(self.id.clone(), self.variant, Box::new(network))
            .with_input_mode(self.input)
            .with_structure(self.structure)
            .with_dark_boost(self.dark_boost)
            .with_equalize(self.equalize);
        Ok(Arc::new(backend))
    }
}

type Factory = Box<dyn Fn() -> Result<Arc<dyn StyleBackend>> + Send + Sync>;

struct Entry {
    id: String,
    factory: Factory,
    // Filled on first use, then shared for the life of the process.
    loaded: Mutex<Option<Arc<dyn StyleBackend>>>,
}

impl Entry {
    fn get(&self) -> Result<Arc<dyn StyleBackend>> {
        let mut slot = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(backend) = slot.as_ref() {
            return Ok(Arc::clone(backend));
        }
        tracing::info!("Loading style backend {}", self.id);
        let backend = (self.factory)()?;
        *slot = Some(Arc::clone(&backend));
        Ok(backend)
    }
}

/// A backend picked for a request.
#[derive(Clone)]
pub struct Resolved {
    pub backend: Arc<dyn StyleBackend>,
    /// Registry id of the backend actually used.
    pub id: String,
    /// True when the requested id was unknown and the default stood in.
    pub fallback: bool,
}

/// Style id -> lazily constructed backend, with one designated default.
pub struct StyleRegistry {
    entries: Vec<Entry>,
    default_id: String,
}

impl StyleRegistry {
    pub fn new(default_id: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            default_id: default_id.into(),
        }
    }

    /// Build a registry whose entries load their weights on first use.
    pub fn from_specs(specs: &[StyleSpec], default_id: &str) -> Result<Self> {
        let mut registry = Self::new(default_id);
        for spec in specs {
            let spec = spec.clone();
            let id = spec.id.clone();
            registry.register(id, move || spec.build())?;
        }
        registry.check_default()?;
        Ok(registry)
    }

    /// Register a backend constructed on first use.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn() -> Result<Arc<dyn StyleBackend>> + Send + Sync + 'static,
    {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::Config("style id must not be empty".into()));
        }
        if self.contains(&id) {
            return Err(Error::Config(format!("style {id} registered twice")));
        }
        self.entries.push(Entry {
            id,
            factory: Box::new(factory),
            loaded: Mutex::new(None),
        });
        Ok(())
    }

    /// Register an already constructed backend.
    pub fn register_backend(
        &mut self,
        id: impl Into<String>,
        backend: Arc<dyn StyleBackend>,
    ) -> Result<()> {
        self.register(id, move || Ok(Arc::clone(&backend)))
    }

    pub fn check_default(&self) -> Result<()> {
        if self.contains(&self.default_id) {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "default style {} is not registered",
                self.default_id
            )))
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Load every backend now. Any failure aborts.
    pub fn preload(&self) -> Result<()> {
        for entry in &self.entries {
            entry.get()?;
        }
        Ok(())
    }

    /// Backend for `style_id`, or the default backend when the id is unknown.
    pub fn resolve(&self, style_id: &str) -> Result<Resolved> {
        if let Some(entry) = self.entries.iter().find(|e| e.id == style_id) {
            return Ok(Resolved {
                backend: entry.get()?,
                id: entry.id.clone(),
                fallback: false,
            });
        }

        // Unknown id: fall back to the default entry
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == self.default_id)
            .ok_or_else(|| {
                Error::Config(format!(
                    "default style {} is not registered",
                    self.default_id
                ))
            })?;
        tracing::warn!(
            "Unrecognized style {:?}, falling back to {}",
            style_id,
            self.default_id
        );
        Ok(Resolved {
            backend: entry.get()?,
            id: entry.id.clone(),
            fallback: true,
        })
    }
}
