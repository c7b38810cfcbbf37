//! Configuration loading, creation and upgrade.
//!
//! The agent reads a single JSON file (`~/.afk.json` by default). Callers never
//! touch the file directly; they ask [`ConfigStore`] for an immutable snapshot.
//! Whether that snapshot is refreshed from disk per trigger or fixed at startup
//! is controlled by the `config_reload` key.

use crate::error::{AfkError, Result};
use fs_err as fs;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const CONFIG_VERSION: u32 = 1;
pub const CONFIG_ENV: &str = "AFK_CONFIG";
const CONFIG_FILE_NAME: &str = ".afk.json";

/// Seconds after the away-transition during which a return is acknowledged
/// with a reaction instead of a new message.
pub const DEFAULT_REACTION_WINDOW_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPolicy {
    /// Keep the configuration read at process start.
    Startup,
    /// Re-read the file once per trigger so live edits are picked up.
    #[default]
    OnTrigger,
}

/// Tri-state message value on an action entry.
///
/// `Inherit` (key absent or `null`) falls back to the global default,
/// `Disabled` (`false` or `""`) suppresses the message, `Text` is used as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MessageSetting {
    #[default]
    Inherit,
    Disabled,
    Text(String),
}

impl MessageSetting {
    pub fn is_inherit(&self) -> bool {
        matches!(self, MessageSetting::Inherit)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMessageSetting {
    Flag(bool),
    Text(String),
}

impl<'de> Deserialize<'de> for MessageSetting {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawMessageSetting>::deserialize(deserializer)?;
        Ok(match raw {
            None | Some(RawMessageSetting::Flag(true)) => MessageSetting::Inherit,
            Some(RawMessageSetting::Flag(false)) => MessageSetting::Disabled,
            Some(RawMessageSetting::Text(text)) if text.trim().is_empty() => {
                MessageSetting::Disabled
            }
            Some(RawMessageSetting::Text(text)) => MessageSetting::Text(text),
        })
    }
}

impl Serialize for MessageSetting {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            MessageSetting::Inherit => serializer.serialize_none(),
            MessageSetting::Disabled => serializer.serialize_bool(false),
            MessageSetting::Text(text) => serializer.serialize_str(text),
        }
    }
}

/// A named, user-configured bundle selectable over IPC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_emoji: Option<String>,
    #[serde(default, skip_serializing_if = "MessageSetting::is_inherit")]
    pub away_message: MessageSetting,
    #[serde(default, skip_serializing_if = "MessageSetting::is_inherit")]
    pub back_message: MessageSetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub token: String,
    pub status_text: String,
    pub status_emoji: String,
    /// Channel for away/back messages (requires `chat:write`).
    pub channel: Option<String>,
    pub away_message: Option<String>,
    pub back_message: Option<String>,
    /// Emoji name (without colons) used instead of the back message
    /// (requires `reactions:write`).
    pub back_emoji: String,
    pub delay_for_reaction_emoji: i64,
    pub actions: Vec<ActionEntry>,
    /// Process name of the messaging client; empty disables the liveness check.
    pub client_app: Option<String>,
    pub config_reload: ReloadPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: None,
            token: String::new(),
            status_text: "I need a break".to_string(),
            status_emoji: ":coffee:".to_string(),
            channel: None,
            away_message: Some("I'm going to take a coffee break".to_string()),
            back_message: Some("I'm back".to_string()),
            back_emoji: "back".to_string(),
            delay_for_reaction_emoji: DEFAULT_REACTION_WINDOW_SECS,
            actions: vec![ActionEntry {
                action: "lunch".to_string(),
                status_text: Some("Lunch break".to_string()),
                status_emoji: Some(":spaghetti:".to_string()),
                away_message: MessageSetting::Text("I'm going to take the lunch break".to_string()),
                back_message: MessageSetting::Inherit,
                command: Some("lock".to_string()),
            }],
            client_app: Some("Slack".to_string()),
            config_reload: ReloadPolicy::OnTrigger,
        }
    }
}

impl AgentConfig {
    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    pub fn channel(&self) -> Option<&str> {
        non_empty(self.channel.as_deref())
    }

    pub fn default_away_message(&self) -> Option<&str> {
        non_empty(self.away_message.as_deref())
    }

    pub fn default_back_message(&self) -> Option<&str> {
        non_empty(self.back_message.as_deref())
    }

    pub fn reaction_window_secs(&self) -> i64 {
        self.delay_for_reaction_emoji.max(0)
    }

    pub fn back_emoji_name(&self) -> &str {
        self.back_emoji.trim().trim_matches(':')
    }

    pub fn client_app(&self) -> Option<&str> {
        non_empty(self.client_app.as_deref())
    }

    /// First entry with an exactly matching name, in configuration order.
    pub fn find_action(&self, name: &str) -> Option<&ActionEntry> {
        self.actions.iter().find(|entry| entry.action == name)
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions
            .iter()
            .map(|entry| entry.action.as_str())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

/// Outcome of [`ensure_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigInit {
    Current,
    Created,
    Upgraded { from: Option<u64> },
}

/// Returns the config path: `AFK_CONFIG` if set, else `~/.afk.json`.
pub fn default_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = dirs::home_dir().ok_or(AfkError::HomeDirNotFound)?;
    Ok(home.join(CONFIG_FILE_NAME))
}

pub fn load_config(path: &Path) -> Result<AgentConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AfkError::ConfigNotFound(path.to_path_buf()))
        }
        Err(err) => {
            return Err(AfkError::Io {
                context: "reading configuration".to_string(),
                source: err,
            })
        }
    };

    serde_json::from_str(&content).map_err(|err| AfkError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// Creates the config file with defaults when missing, or merges in new
/// defaults when the stored `version` is not current. User keys always win.
pub fn ensure_config(path: &Path) -> Result<ConfigInit> {
    if !path.exists() {
        let config = AgentConfig {
            version: Some(CONFIG_VERSION),
            ..AgentConfig::default()
        };
        let value = serde_json::to_value(&config).map_err(|err| AfkError::Json {
            context: "serializing default configuration".to_string(),
            source: err,
        })?;
        write_config_value(path, &value)?;
        tracing::info!(path = %path.display(), "Configuration file created");
        return Ok(ConfigInit::Created);
    }

    let content = fs::read_to_string(path).map_err(|err| AfkError::Io {
        context: "reading configuration".to_string(),
        source: err,
    })?;
    let stored: Value = serde_json::from_str(&content).map_err(|err| AfkError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })?;
    let stored_version = stored.get("version").and_then(Value::as_u64);
    if stored_version == Some(u64::from(CONFIG_VERSION)) {
        return Ok(ConfigInit::Current);
    }

    let merged = merge_with_defaults(stored).map_err(|details| AfkError::ConfigMalformed {
        path: path.to_path_buf(),
        details,
    })?;
    write_config_value(path, &merged)?;
    tracing::info!(
        path = %path.display(),
        from = ?stored_version,
        to = CONFIG_VERSION,
        "Configuration file upgraded"
    );
    Ok(ConfigInit::Upgraded {
        from: stored_version,
    })
}

fn merge_with_defaults(stored: Value) -> std::result::Result<Value, String> {
    let Value::Object(user) = stored else {
        return Err("configuration root must be an object".to_string());
    };
    let defaults = serde_json::to_value(AgentConfig::default()).map_err(|err| err.to_string())?;
    let Value::Object(mut merged) = defaults else {
        return Err("default configuration is not an object".to_string());
    };
    merged.extend(user);
    merged.insert("version".to_string(), Value::from(CONFIG_VERSION));
    Ok(Value::Object(merged))
}

fn write_config_value(path: &Path, value: &Value) -> Result<()> {
    let write_err = |source| AfkError::ConfigWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }
    let payload = serde_json::to_vec_pretty(value).map_err(|err| AfkError::Json {
        context: "serializing configuration".to_string(),
        source: err,
    })?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).map_err(write_err)?;
    fs::rename(&tmp_path, path).map_err(write_err)?;
    Ok(())
}

/// Hands out immutable configuration snapshots under the configured
/// [`ReloadPolicy`].
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    policy: ReloadPolicy,
    current: Mutex<Arc<AgentConfig>>,
}

impl ConfigStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = load_config(&path)?;
        Ok(Self {
            policy: config.config_reload,
            path: Some(path),
            current: Mutex::new(Arc::new(config)),
        })
    }

    /// A store that never touches the filesystem.
    pub fn fixed(config: AgentConfig) -> Self {
        Self {
            path: None,
            policy: ReloadPolicy::Startup,
            current: Mutex::new(Arc::new(config)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn policy(&self) -> ReloadPolicy {
        self.policy
    }

    /// Returns the configuration to use for one trigger.
    ///
    /// Under `on_trigger` the file is re-read; a failed re-read keeps the
    /// previous snapshot.
    pub fn snapshot(&self) -> Arc<AgentConfig> {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let (ReloadPolicy::OnTrigger, Some(path)) = (self.policy, self.path.as_deref()) {
            match load_config(path) {
                Ok(config) => {
                    if config != **current {
                        tracing::debug!(path = %path.display(), "Configuration reloaded");
                        *current = Arc::new(config);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to reload configuration; keeping previous");
                }
            }
        }

        Arc::clone(&current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_json(path: &Path, value: Value) {
        std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config: AgentConfig = serde_json::from_value(json!({"token": "xoxp-1"})).unwrap();
        assert_eq!(config.token, "xoxp-1");
        assert_eq!(config.status_emoji, ":coffee:");
        assert_eq!(config.reaction_window_secs(), 5);
        assert_eq!(config.config_reload, ReloadPolicy::OnTrigger);
        assert_eq!(config.action_names(), vec!["lunch"]);
    }

    #[test]
    fn back_message_tri_state_deserializes() {
        let config: AgentConfig = serde_json::from_value(json!({
            "actions": [
                {"action": "a"},
                {"action": "b", "back_message": null},
                {"action": "c", "back_message": false},
                {"action": "d", "back_message": ""},
                {"action": "e", "back_message": "See you"}
            ]
        }))
        .unwrap();

        let setting = |name: &str| config.find_action(name).unwrap().back_message.clone();
        assert_eq!(setting("a"), MessageSetting::Inherit);
        assert_eq!(setting("b"), MessageSetting::Inherit);
        assert_eq!(setting("c"), MessageSetting::Disabled);
        assert_eq!(setting("d"), MessageSetting::Disabled);
        assert_eq!(setting("e"), MessageSetting::Text("See you".to_string()));
    }

    #[test]
    fn disabled_setting_serializes_as_false() {
        let entry = ActionEntry {
            action: "focus".to_string(),
            back_message: MessageSetting::Disabled,
            ..ActionEntry::default()
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["back_message"], json!(false));
        assert!(value.get("away_message").is_none());
    }

    #[test]
    fn find_action_prefers_first_match() {
        let config: AgentConfig = serde_json::from_value(json!({
            "actions": [
                {"action": "dup", "status_text": "first"},
                {"action": "dup", "status_text": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(
            config.find_action("dup").unwrap().status_text.as_deref(),
            Some("first")
        );
        assert!(config.find_action("Dup").is_none());
    }

    #[test]
    fn blank_channel_and_messages_read_as_absent() {
        let config: AgentConfig = serde_json::from_value(json!({
            "channel": "  ",
            "away_message": "",
            "back_message": null,
            "back_emoji": ":back:"
        }))
        .unwrap();
        assert!(config.channel().is_none());
        assert!(config.default_away_message().is_none());
        assert!(config.default_back_message().is_none());
        assert_eq!(config.back_emoji_name(), "back");
    }

    #[test]
    fn ensure_config_creates_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".afk.json");

        assert_eq!(ensure_config(&path).unwrap(), ConfigInit::Created);
        let config = load_config(&path).unwrap();
        assert_eq!(config.version, Some(CONFIG_VERSION));
        assert!(!config.has_token());

        assert_eq!(ensure_config(&path).unwrap(), ConfigInit::Current);
    }

    #[test]
    fn ensure_config_upgrade_keeps_user_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".afk.json");
        write_json(
            &path,
            json!({"token": "xoxp-user", "status_text": "Gone fishing", "actions": []}),
        );

        assert_eq!(
            ensure_config(&path).unwrap(),
            ConfigInit::Upgraded { from: None }
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.version, Some(CONFIG_VERSION));
        assert_eq!(config.token, "xoxp-user");
        assert_eq!(config.status_text, "Gone fishing");
        assert!(config.actions.is_empty());
        assert_eq!(config.back_emoji, "back");
    }

    #[test]
    fn load_reports_missing_and_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(
            load_config(&path),
            Err(AfkError::ConfigNotFound(_))
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(AfkError::ConfigMalformed { .. })
        ));
    }

    #[test]
    fn on_trigger_store_picks_up_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".afk.json");
        write_json(&path, json!({"token": "t", "status_text": "one"}));

        let store = ConfigStore::load(&path).unwrap();
        assert_eq!(store.policy(), ReloadPolicy::OnTrigger);
        assert_eq!(store.snapshot().status_text, "one");

        write_json(&path, json!({"token": "t", "status_text": "two"}));
        assert_eq!(store.snapshot().status_text, "two");

        std::fs::write(&path, "garbage").unwrap();
        assert_eq!(store.snapshot().status_text, "two");
    }

    #[test]
    fn startup_store_ignores_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".afk.json");
        write_json(
            &path,
            json!({"token": "t", "status_text": "one", "config_reload": "startup"}),
        );

        let store = ConfigStore::load(&path).unwrap();
        write_json(
            &path,
            json!({"token": "t", "status_text": "two", "config_reload": "startup"}),
        );
        assert_eq!(store.snapshot().status_text, "one");
    }
}
