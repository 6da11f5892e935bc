//! Engine configuration.
//!
//! All knobs are performance trade-offs; none changes what a query returns.

use serde::{Deserialize, Serialize};

/// Configuration for an [`Engine`](crate::engine::Engine) and the
/// [`Cursor`](crate::cursor::Cursor)s it hands out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A cursor keeps a full copy of its union-find every this many applied
    /// effects, so long backward jumps restore a copy instead of undoing
    /// effect by effect. `0` disables checkpoints.
    pub checkpoint_interval: usize,
    /// Compress paths inside the throwaway union-find built per query.
    pub compress_paths: bool,
}

impl Default for EngineConfig {
    /// Checkpoints every 64 effects, path compression on.
    fn default() -> Self {
        Self {
            checkpoint_interval: 64,
            compress_paths: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
