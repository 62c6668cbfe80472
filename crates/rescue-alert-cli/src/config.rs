//! CLI configuration loading

use rescue_alert_policy::EngineConfig;
use std::path::Path;
use tracing::debug;

/// Overrides given on the command line, applied on top of the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Pin the evaluation clock
    pub now: Option<String>,

    /// Mark emitted alerts as capped per recipient
    pub per_recipient_caps: bool,
}

/// Load engine configuration from file and CLI overrides
pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<EngineConfig> {
    let mut config = match config_path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    if let Some(now) = &overrides.now {
        config.fixed_now = Some(now.clone());
    }
    if overrides.per_recipient_caps {
        config.per_recipient_caps = true;
    }

    debug!(
        verify_replay = config.verify_replay,
        per_recipient_caps = config.per_recipient_caps,
        fixed_now = ?config.fixed_now,
        "Engine configuration loaded"
    );
    Ok(config)
}
