//! Tracker configuration.
//!
//! [`TrackerConfig`] is plain data. Hosts embed it in their own
//! configuration files; every field has a default so partial documents
//! deserialize.
//!
//! # Example
//!
//! ```
//! use strata_tracker::config::TrackerConfig;
//!
//! let config: TrackerConfig =
//!     serde_json::from_str(r#"{ "log_block_actions": true }"#).unwrap();
//! assert!(config.log_block_actions);
//! assert!(config.capture_entity_spawns);
//! assert_eq!(config.destruct_commands, vec!["kill".to_owned()]);
//! ```

use serde::{Deserialize, Serialize};

/// Switches controlling capture and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Defer entities spawned inside a ticking scope to the end-of-scope
    /// flush. When off, every spawn fires its own event immediately.
    pub capture_entity_spawns: bool,
    /// Emit an `info` log line for every committed block change.
    pub log_block_actions: bool,
    /// Emit an `info` log line for every entity that enters the world.
    pub log_entity_spawns: bool,
    /// Propagate notifier provenance to neighbors on physics updates.
    pub track_notifiers: bool,
    /// Chat commands whose item drops count as destruction of the sender.
    pub destruct_commands: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            capture_entity_spawns: true,
            log_block_actions: false,
            log_entity_spawns: false,
            track_notifiers: true,
            destruct_commands: vec!["kill".to_owned()],
        }
    }
}

impl TrackerConfig {
    /// Whether `message` invokes one of the destruct commands.
    pub fn is_destruct_command(&self, message: &str) -> bool {
        self.destruct_commands
            .iter()
            .any(|command| message.contains(command.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: TrackerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn destruct_command_matches_substring() {
        let config = TrackerConfig::default();
        assert!(config.is_destruct_command("/kill"));
        assert!(config.is_destruct_command("/kill @e[type=item]"));
        assert!(!config.is_destruct_command("/give alex stone"));

        let custom = TrackerConfig {
            destruct_commands: vec!["smite".to_owned()],
            ..TrackerConfig::default()
        };
        assert!(!custom.is_destruct_command("/kill"));
        assert!(custom.is_destruct_command("/smite sam"));
    }

    #[test]
    fn round_trips_through_json() {
        let config = TrackerConfig {
            log_entity_spawns: true,
            track_notifiers: false,
            ..TrackerConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: TrackerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
