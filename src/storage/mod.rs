pub mod engine;
pub mod http;
pub mod memory;
pub mod naming;

use std::sync::Arc;
use crate::core::config::{EngineConfig, EngineKind};
use crate::core::error::Result;
use crate::storage::engine::StorageEngine;
use crate::storage::http::HttpEngine;
use crate::storage::memory::MemoryEngine;

/// Builds the engine selected by configuration.
pub fn connect(config: &EngineConfig) -> Result<Arc<dyn StorageEngine>> {
    match config.kind {
        EngineKind::Http => Ok(Arc::new(HttpEngine::new(config)?)),
        EngineKind::Memory => Ok(Arc::new(MemoryEngine::new())),
    }
}
