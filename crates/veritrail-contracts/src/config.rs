//! TOML runtime configuration.
//!
//! ```toml
//! [mission]
//! max_steps = 20
//! recent_events = 10
//! tool_timeout_secs = 15
//! step_deadline_secs = 60
//! validate_params = true
//!
//! [verify]
//! missing_basis = "warn"   # or "fail"
//! ```
//!
//! Every key is optional; an empty document yields the defaults.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{VeritrailError, VeritrailResult};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub mission: MissionConfig,
    pub verify: VerifyConfig,
}

impl RuntimeConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `VeritrailError::ConfigError` if the TOML is malformed, has
    /// unknown keys, or fails validation.
    pub fn from_toml_str(s: &str) -> VeritrailResult<Self> {
        let config: RuntimeConfig = toml::from_str(s).map_err(|e| VeritrailError::ConfigError {
            reason: format!("failed to parse config TOML: {}", e),
        })?;
        config.mission.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> VeritrailResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| VeritrailError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Limits for the decide-and-act loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MissionConfig {
    /// Step budget before `TerminatedByStepLimit`.
    pub max_steps: u32,
    /// How many of the latest events are shown to the brain each step.
    pub recent_events: usize,
    /// Per-call deadline for a dispatched tool.
    pub tool_timeout_secs: u64,
    /// Overall deadline for one step: the brain request plus any tool call
    /// it leads to.  A tool call is cut short when this runs out first.
    pub step_deadline_secs: u64,
    /// Check decoded parameters against the tool's schema before dispatch.
    pub validate_params: bool,
}

impl MissionConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn step_deadline(&self) -> Duration {
        Duration::from_secs(self.step_deadline_secs)
    }

    fn validate(&self) -> VeritrailResult<()> {
        if self.max_steps == 0 {
            return Err(VeritrailError::ConfigError {
                reason: "mission.max_steps must be at least 1".to_string(),
            });
        }
        if self.tool_timeout_secs == 0 || self.step_deadline_secs == 0 {
            return Err(VeritrailError::ConfigError {
                reason: "mission timeouts must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            recent_events: 10,
            tool_timeout_secs: 15,
            step_deadline_secs: 60,
            validate_params: true,
        }
    }
}

/// How the verifier treats an `ACTION` without a `basisId`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingBasisPolicy {
    /// Flag for audit review; validity is unaffected.
    #[default]
    Warn,
    /// Treat as a chain failure.
    Fail,
}

/// Verifier policy knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    pub missing_basis: MissingBasisPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.mission.tool_timeout(), Duration::from_secs(15));
        assert_eq!(config.mission.max_steps, 20);
        assert_eq!(config.verify.missing_basis, MissingBasisPolicy::Warn);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [mission]
            max_steps = 3

            [verify]
            missing_basis = "fail"
            "#,
        )
        .unwrap();
        assert_eq!(config.mission.max_steps, 3);
        assert_eq!(config.mission.recent_events, 10);
        assert_eq!(config.verify.missing_basis, MissingBasisPolicy::Fail);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RuntimeConfig::from_toml_str("[mission]\nmax_stepz = 3\n").unwrap_err();
        assert!(matches!(err, VeritrailError::ConfigError { .. }));
    }

    #[test]
    fn zero_step_budget_is_rejected() {
        let err = RuntimeConfig::from_toml_str("[mission]\nmax_steps = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = RuntimeConfig::from_file(Path::new("/no/such/veritrail.toml")).unwrap_err();
        assert!(matches!(err, VeritrailError::ConfigError { .. }));
    }
}
