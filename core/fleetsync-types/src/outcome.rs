//! Per-system outcomes and the combined dual-write result.

use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One of the two backing systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemId {
    /// The IoT platform REST API.
    Primary,
    /// The database-backed backup API.
    Secondary,
}

impl SystemId {
    /// The other system.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            SystemId::Primary => SystemId::Secondary,
            SystemId::Secondary => SystemId::Primary,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SystemId::Primary => "primary",
            SystemId::Secondary => "secondary",
        }
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(SystemId::Primary),
            "secondary" => Ok(SystemId::Secondary),
            other => Err(Error::UnknownSystem(other.to_string())),
        }
    }
}

/// What happened on one system during a dual write.
///
/// A freshly constructed outcome is "untried": not attempted, not successful,
/// no data and no error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemOutcome {
    pub system: SystemId,
    pub attempted: bool,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl SystemOutcome {
    pub fn untried(system: SystemId) -> Self {
        Self {
            system,
            attempted: false,
            success: false,
            data: None,
            error: None,
        }
    }

    pub fn succeeded(system: SystemId, data: Value) -> Self {
        Self {
            system,
            attempted: true,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(system: SystemId, error: impl Into<String>) -> Self {
        Self {
            system,
            attempted: true,
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_untried(&self) -> bool {
        !self.attempted
    }

    /// The `id` field of the returned data, if any. Numeric ids are
    /// rendered as strings.
    pub fn returned_id(&self) -> Option<String> {
        match self.data.as_ref()?.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// Combined record of one dual write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualWriteResult {
    pub primary: SystemOutcome,
    pub secondary: SystemOutcome,
    /// The first-attempted system failed and the other one took the write.
    pub fallback_used: bool,
    /// The first-attempted system accepted the write.
    pub primary_succeeded: bool,
}

impl DualWriteResult {
    /// A result with both systems untried.
    pub fn new() -> Self {
        Self {
            primary: SystemOutcome::untried(SystemId::Primary),
            secondary: SystemOutcome::untried(SystemId::Secondary),
            fallback_used: false,
            primary_succeeded: false,
        }
    }

    pub fn outcome(&self, system: SystemId) -> &SystemOutcome {
        match system {
            SystemId::Primary => &self.primary,
            SystemId::Secondary => &self.secondary,
        }
    }

    pub fn set_outcome(&mut self, outcome: SystemOutcome) {
        match outcome.system {
            SystemId::Primary => self.primary = outcome,
            SystemId::Secondary => self.secondary = outcome,
        }
    }

    pub fn both_succeeded(&self) -> bool {
        self.primary.success && self.secondary.success
    }

    pub fn any_succeeded(&self) -> bool {
        self.primary.success || self.secondary.success
    }

    /// The system that was attempted and failed while the other succeeded.
    pub fn diverged_system(&self) -> Option<SystemId> {
        match (&self.primary, &self.secondary) {
            (p, s) if p.success && s.attempted && !s.success => Some(SystemId::Secondary),
            (p, s) if s.success && p.attempted && !p.success => Some(SystemId::Primary),
            _ => None,
        }
    }
}

impl Default for DualWriteResult {
    fn default() -> Self {
        Self::new()
    }
}
