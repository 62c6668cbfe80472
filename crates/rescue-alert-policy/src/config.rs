//! Engine configuration

use rescue_alert_core::{Clock, Error, FixedClock, Result, SystemClock};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::evaluator::EvaluatorOptions;

/// Policy engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Check the incremental projection against a full replay before evaluating
    #[serde(default = "default_true")]
    pub verify_replay: bool,

    /// Recorded on every `alert_emitted` event
    #[serde(default)]
    pub per_recipient_caps: bool,

    /// Attach predicted ineligibility to `policy_evaluated`
    #[serde(default = "default_true")]
    pub emit_predicted_ineligibility: bool,

    /// Pin the clock to this ISO-8601 instant for offline re-evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_now: Option<String>,
}

impl EngineConfig {
    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::config(format!("invalid engine config: {}", e)))
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Evaluator options derived from this configuration
    pub fn evaluator_options(&self) -> EvaluatorOptions {
        EvaluatorOptions {
            per_recipient_caps: self.per_recipient_caps,
            emit_predicted_ineligibility: self.emit_predicted_ineligibility,
        }
    }

    /// Clock for this configuration: pinned if `fixed_now` is set, real time otherwise
    pub fn clock(&self) -> Result<Box<dyn Clock>> {
        match &self.fixed_now {
            Some(timestamp) => {
                let clock = FixedClock::parse(timestamp)
                    .map_err(|e| Error::config(format!("invalid fixed_now '{}': {}", timestamp, e)))?;
                Ok(Box::new(clock))
            }
            None => Ok(Box::new(SystemClock)),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_replay: true,
            per_recipient_caps: false,
            emit_predicted_ineligibility: true,
            fixed_now: None,
        }
    }
}

fn default_true() -> bool {
    true
}
