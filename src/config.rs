//! Settings record and API base URL resolution

use crate::store::{LocalStore, CHAT_SETTINGS_KEY};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8840";
pub const API_URL_ENV: &str = "LIFETRACE_API_URL";

/// Flat settings record persisted under `chatSettings`.
///
/// Every field has a default, so a stored record that lacks newer keys is
/// merged over the defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub api_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub enable_thinking: bool,
    pub local_history_enabled: bool,
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            system_prompt: "You are a helpful AI assistant.".to_string(),
            enable_thinking: true,
            local_history_enabled: true,
            history_limit: 6,
        }
    }
}

impl Settings {
    pub fn load(store: &LocalStore) -> Self {
        let settings: Settings = store.load_or_default(CHAT_SETTINGS_KEY);
        info!("Loaded settings (api_url = {})", settings.api_url);
        settings
    }

    pub fn save(&self, store: &LocalStore) {
        store.save_logged(CHAT_SETTINGS_KEY, self);
    }

    /// Field names accepted by `config get/set/unset`.
    pub fn keys() -> &'static [&'static str] {
        &[
            "apiUrl",
            "temperature",
            "maxTokens",
            "systemPrompt",
            "enableThinking",
            "localHistoryEnabled",
            "historyLimit",
        ]
    }

    /// Read one field as JSON.
    pub fn get_field(&self, key: &str) -> Option<Value> {
        serde_json::to_value(self).ok()?.get(key).cloned()
    }

    /// Set one field from its textual form.
    ///
    /// The text is parsed as JSON first (numbers, booleans) and falls back
    /// to a plain string, then the whole record is re-validated.
    pub fn set_field(&mut self, key: &str, raw: &str) -> Result<(), String> {
        if !Self::keys().contains(&key) {
            return Err(format!("unknown settings key: {}", key));
        }
        let parsed = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        let updated = self.with_field(key, parsed).or_else(|e| {
            // "42" for a string field
            self.with_field(key, Value::String(raw.to_string())).map_err(|_| e)
        })?;
        *self = updated;
        Ok(())
    }

    fn with_field(&self, key: &str, value: Value) -> Result<Settings, String> {
        let mut doc = serde_json::to_value(self).map_err(|e| e.to_string())?;
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
        serde_json::from_value(doc).map_err(|e| format!("invalid value for {}: {}", key, e))
    }

    /// Reset one field to its default.
    pub fn unset_field(&mut self, key: &str) -> Result<(), String> {
        let default = Settings::default()
            .get_field(key)
            .ok_or_else(|| format!("unknown settings key: {}", key))?;
        self.set_field(key, &default.to_string())
    }
}

/// Pick the backend base URL: CLI flag, env var, stored settings, default.
pub fn resolve_api_url(flag: Option<&str>, settings: &Settings) -> String {
    let from_env = std::env::var(API_URL_ENV).ok();
    let url = flag
        .map(str::to_string)
        .or(from_env)
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| settings.api_url.clone());
    normalize_base_url(&url)
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        warn!("Empty API URL, using default");
        return DEFAULT_API_URL.to_string();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_record_merges_over_defaults() {
        let s: Settings = serde_json::from_str(r#"{"apiUrl":"http://10.0.0.2:9000","historyLimit":3}"#).unwrap();
        assert_eq!(s.api_url, "http://10.0.0.2:9000");
        assert_eq!(s.history_limit, 3);
        assert_eq!(s.max_tokens, 2000);
        assert!(s.enable_thinking);
    }

    #[test]
    fn test_set_field_parses_types() {
        let mut s = Settings::default();
        s.set_field("temperature", "0.2").unwrap();
        s.set_field("enableThinking", "false").unwrap();
        s.set_field("systemPrompt", "be brief").unwrap();
        assert_eq!(s.temperature, 0.2);
        assert!(!s.enable_thinking);
        assert_eq!(s.system_prompt, "be brief");
    }

    #[test]
    fn test_set_field_rejects_bad_value_and_key() {
        let mut s = Settings::default();
        assert!(s.set_field("maxTokens", "lots").is_err());
        assert_eq!(s.max_tokens, 2000);
        assert!(s.set_field("colour", "red").is_err());
    }

    #[test]
    fn test_unset_restores_default() {
        let mut s = Settings::default();
        s.set_field("historyLimit", "12").unwrap();
        s.unset_field("historyLimit").unwrap();
        assert_eq!(s.history_limit, 6);
    }

    #[test]
    fn test_flag_beats_settings() {
        let s = Settings::default();
        assert_eq!(resolve_api_url(Some("localhost:9999/"), &s), "http://localhost:9999");
    }

    #[test]
    fn test_normalize_keeps_scheme() {
        assert_eq!(normalize_base_url("https://lt.example/"), "https://lt.example");
        assert_eq!(normalize_base_url("  "), DEFAULT_API_URL);
    }
}
