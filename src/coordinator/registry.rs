//! Builder registry
//!
//! Maps strategy names to builders. Populated once at startup, then only
//! read. A process-wide instance is available through `global()`, but
//! callers that can pass a registry explicitly should.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::config::Conf;
use crate::error::{LakeError, Result};

use super::{CommitCoordinatorBuilder, CommitCoordinatorClient};

#[derive(Default)]
pub struct BuilderRegistry {
    builders: RwLock<HashMap<String, Arc<dyn CommitCoordinatorBuilder>>>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder under its own name. Returns the builder it replaced.
    pub fn register(
        &self,
        builder: Arc<dyn CommitCoordinatorBuilder>,
    ) -> Option<Arc<dyn CommitCoordinatorBuilder>> {
        let name = builder.name().to_string();
        tracing::debug!("registering commit coordinator builder {:?}", name);
        self.builders.write().insert(name, builder)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn CommitCoordinatorBuilder>> {
        self.builders
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LakeError::UnknownStrategy(name.to_string()))
    }

    /// Resolve `name` and build a client from `conf`
    pub fn build(&self, name: &str, conf: &Conf) -> Result<Arc<dyn CommitCoordinatorClient>> {
        self.resolve(name)?.build(conf)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Process-wide registry
pub fn global() -> &'static BuilderRegistry {
    static REGISTRY: OnceLock<BuilderRegistry> = OnceLock::new();
    REGISTRY.get_or_init(BuilderRegistry::new)
}
