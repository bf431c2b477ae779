use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rigsync_api_core::UserId;
use rigsync_pose_core::HandlerConfig;

/// Session settings. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial value of the registry's activation flag.
    pub bindings_activated: bool,
    pub interpolate_poses: bool,
    pub ambient_confirm_ticks: u32,
    /// Commands applied per step; `0` drains the whole queue.
    pub max_commands_per_step: usize,
    /// User whose skeleton pose conditions read from.
    pub local_user: Option<UserId>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let handler = HandlerConfig::default();
        Self {
            bindings_activated: true,
            interpolate_poses: handler.interpolate_poses,
            ambient_confirm_ticks: handler.ambient_confirm_ticks,
            max_commands_per_step: 0,
            local_user: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("invalid session config JSON")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read session config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            interpolate_poses: self.interpolate_poses,
            ambient_confirm_ticks: self.ambient_confirm_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = SessionConfig::from_json_str(r#"{"max_commands_per_step": 4}"#).unwrap();
        assert_eq!(cfg.max_commands_per_step, 4);
        assert!(cfg.bindings_activated);
        assert_eq!(cfg.ambient_confirm_ticks, 1);
        assert_eq!(cfg.local_user, None);
    }

    #[test]
    fn bad_json_is_reported() {
        let err = SessionConfig::from_json_str(r#"{"bindings_activated": "yes"}"#).unwrap_err();
        assert!(format!("{err:#}").contains("invalid session config JSON"));
        assert!(SessionConfig::load("/nonexistent/rigsync.json").is_err());
    }
}
