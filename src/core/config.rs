use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Engine behaviour shared by every builder and graph created from a
/// [`Context`](super::Context).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reject closures whose positional argument count differs from the
    /// kernel signature.
    #[serde(default = "default_true")]
    pub strict_arity: bool,
    /// Check value types and launch domains against kernel signatures.
    #[serde(default = "default_true")]
    pub check_types: bool,
    /// Drop closures no graph output depends on when a graph is created.
    #[serde(default)]
    pub prune_unused_closures: bool,
    /// Upper bound on closures per builder. 0 means unlimited.
    #[serde(default)]
    pub max_closures: usize,
    /// Partition closures into batches at graph creation.
    #[serde(default = "default_true")]
    pub plan_batches: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            strict_arity: true,
            check_types: true,
            prune_unused_closures: false,
            max_closures: 0,
            plan_batches: true,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON engine configuration. Missing keys take their defaults.
    pub fn from_json(content: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, GraphError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn with_strict_arity(mut self, strict: bool) -> Self {
        self.strict_arity = strict;
        self
    }

    pub fn with_type_checks(mut self, enabled: bool) -> Self {
        self.check_types = enabled;
        self
    }

    pub fn with_pruning(mut self, enabled: bool) -> Self {
        self.prune_unused_closures = enabled;
        self
    }

    pub fn with_max_closures(mut self, max: usize) -> Self {
        self.max_closures = max;
        self
    }

    pub fn with_batch_planning(mut self, enabled: bool) -> Self {
        self.plan_batches = enabled;
        self
    }
}
