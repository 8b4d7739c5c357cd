//! Per-session parse options.

use serde::Deserialize;
use std::collections::BTreeSet;

/// Experiment that enables `script` blocks.
pub const EXPERIMENT_SCRIPTS: &str = "scripts";
/// Experiment that enables `input`, `output` and `sharing_backend` blocks.
pub const EXPERIMENT_OUTPUTS_SHARING: &str = "outputs-sharing";

/// Options shared by every session started with them.
///
/// Deserializable so callers can load it from their own configuration
/// files; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    /// Experiments enabled in addition to those declared in
    /// `terramate.config.experiments`.
    pub experiments: BTreeSet<String>,
}

impl ParseOptions {
    pub fn with_experiment(mut self, name: impl Into<String>) -> Self {
        self.experiments.insert(name.into());
        self
    }
}
