//! Tunables of an inference run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lattice::widening::{DEFAULT_LOOP_PASSES, DEFAULT_MAX_INLINE_DEPTH};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid inference config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("loop_passes must be at least 1")]
    ZeroLoopPasses,
}

/// Inference settings, loadable from TOML:
///
/// ```
/// use shape_infer::InferenceConfig;
///
/// let config = InferenceConfig::from_toml_str("loop_passes = 3").unwrap();
/// assert_eq!(config.loop_passes, 3);
/// assert!(config.simulate_builtins);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Passes over each `for` body.
    pub loop_passes: usize,
    /// Deepest chain of inlined calls; `None` is unbounded.
    pub max_inline_depth: Option<usize>,
    /// Evaluate builtins without a rule on stand-in values.
    pub simulate_builtins: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            loop_passes: DEFAULT_LOOP_PASSES,
            max_inline_depth: DEFAULT_MAX_INLINE_DEPTH,
            simulate_builtins: true,
        }
    }
}

impl InferenceConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: InferenceConfig = toml::from_str(source)?;
        if config.loop_passes == 0 {
            return Err(ConfigError::ZeroLoopPasses);
        }
        Ok(config)
    }

    pub fn with_loop_passes(mut self, passes: usize) -> Self {
        self.loop_passes = passes;
        self
    }

    pub fn with_max_inline_depth(mut self, depth: usize) -> Self {
        self.max_inline_depth = Some(depth);
        self
    }
}
