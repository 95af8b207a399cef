//! System availability report.

use fleetsync_types::SystemId;
use serde::{Deserialize, Serialize};

/// Health of one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub error: Option<String>,
}

impl Availability {
    pub fn up() -> Self {
        Self {
            available: true,
            error: None,
        }
    }

    pub fn down(error: impl Into<String>) -> Self {
        Self {
            available: false,
            error: Some(error.into()),
        }
    }
}

/// Health of both systems plus the active policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub primary: Availability,
    pub secondary: Availability,
    pub fallback_enabled: bool,
    pub preferred_system: SystemId,
}

impl SystemStatus {
    /// Whether at least one system can take writes.
    pub fn any_available(&self) -> bool {
        self.primary.available || self.secondary.available
    }
}
