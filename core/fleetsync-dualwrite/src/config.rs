//! Orchestrator configuration.

use fleetsync_types::SystemId;
use serde::{Deserialize, Serialize};

/// Static dual-write policy, fixed when the orchestrator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualWriteConfig {
    /// Attempt the secondary system first.
    pub prefer_secondary: bool,
    /// Try the other system when the first-attempted one fails.
    pub fallback_enabled: bool,
}

impl DualWriteConfig {
    /// The system attempted first for ordinary writes and reads.
    pub const fn preferred_system(&self) -> SystemId {
        if self.prefer_secondary {
            SystemId::Secondary
        } else {
            SystemId::Primary
        }
    }
}

impl Default for DualWriteConfig {
    fn default() -> Self {
        Self {
            prefer_secondary: false,
            fallback_enabled: true,
        }
    }
}
