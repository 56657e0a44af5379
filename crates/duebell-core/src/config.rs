//! Duebell configuration system.
//!
//! Secrets and endpoints come from the environment and are all required.
//! Dispatch tuning comes from an optional TOML file, and any of its keys can
//! be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DuebellError, Result};
use crate::types::decode_base64url;

pub const ENV_STORE_URL: &str = "DUEBELL_STORE_URL";
pub const ENV_STORE_KEY: &str = "DUEBELL_STORE_KEY";
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_KEY: &str = "SUPABASE_SERVICE_KEY";
pub const ENV_VAPID_PUBLIC_KEY: &str = "VAPID_PUBLIC_KEY";
pub const ENV_VAPID_PRIVATE_KEY: &str = "VAPID_PRIVATE_KEY";
pub const ENV_VAPID_SUBJECT: &str = "VAPID_SUBJECT";

/// How due tasks are matched to subscriptions. One value per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPolicy {
    /// Each task carries exactly one subscription.
    #[default]
    Linked,
    /// Every known subscription receives every due task.
    Broadcast,
}

/// What goes into the notification dedup tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMode {
    /// Tag = task ID. A new due cycle replaces an unacknowledged banner.
    #[default]
    TaskId,
    /// Tag = task ID + due timestamp. Each due cycle gets its own banner.
    TaskIdAndDue,
}

/// Where the notification title comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleMode {
    /// The configured `title` string.
    #[default]
    Fixed,
    /// The task's display name.
    TaskName,
}

macro_rules! impl_from_str {
    ($ty:ty, $what:literal) => {
        impl FromStr for $ty {
            type Err = DuebellError;

            fn from_str(s: &str) -> Result<Self> {
                serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
                    .map_err(|_| DuebellError::ConfigIncomplete(format!("Unknown {}: '{s}'", $what)))
            }
        }
    };
}

impl_from_str!(SubscriptionPolicy, "subscription policy");
impl_from_str!(TagMode, "tag mode");
impl_from_str!(TitleMode, "title mode");

/// Dispatch tuning (TOML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub policy: SubscriptionPolicy,
    #[serde(default)]
    pub tag_mode: TagMode,
    #[serde(default)]
    pub title_mode: TitleMode,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_body_prefix")]
    pub body_prefix: String,
    /// Icon path; empty disables.
    #[serde(default = "default_icon")]
    pub icon: String,
    /// Badge path; empty disables.
    #[serde(default = "default_icon")]
    pub badge: String,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u32,
}

fn default_title() -> String { "Task Reminder".into() }
fn default_body_prefix() -> String { "Time to do".into() }
fn default_icon() -> String { "/icons/Icon-192.png".into() }
fn default_send_timeout() -> u64 { 10 }
fn default_max_concurrency() -> usize { 16 }
fn default_ttl() -> u32 { 86_400 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            policy: SubscriptionPolicy::default(),
            tag_mode: TagMode::default(),
            title_mode: TitleMode::default(),
            title: default_title(),
            body_prefix: default_body_prefix(),
            icon: default_icon(),
            badge: default_icon(),
            send_timeout_secs: default_send_timeout(),
            max_concurrency: default_max_concurrency(),
            ttl_secs: default_ttl(),
        }
    }
}

impl DispatchConfig {
    /// Load from the default path (~/.duebell/config.toml), or defaults if absent.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DuebellError::ConfigIncomplete(format!("Failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            DuebellError::ConfigIncomplete(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Duebell home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".duebell")
    }

    /// Apply `DUEBELL_*` overrides.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DUEBELL_POLICY") {
            self.policy = v.parse()?;
        }
        if let Some(v) = get("DUEBELL_TAG_MODE") {
            self.tag_mode = v.parse()?;
        }
        if let Some(v) = get("DUEBELL_TITLE_MODE") {
            self.title_mode = v.parse()?;
        }
        if let Some(v) = get("DUEBELL_TITLE") {
            self.title = v;
        }
        if let Some(v) = get("DUEBELL_BODY_PREFIX") {
            self.body_prefix = v;
        }
        // Set-but-empty disables the image.
        if let Some(v) = lookup("DUEBELL_ICON") {
            self.icon = v.trim().to_string();
        }
        if let Some(v) = lookup("DUEBELL_BADGE") {
            self.badge = v.trim().to_string();
        }
        if let Some(v) = get("DUEBELL_SEND_TIMEOUT_SECS") {
            self.send_timeout_secs = parse_number("DUEBELL_SEND_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("DUEBELL_MAX_CONCURRENCY") {
            self.max_concurrency = parse_number("DUEBELL_MAX_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("DUEBELL_TTL_SECS") {
            self.ttl_secs = parse_number("DUEBELL_TTL_SECS", &v)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.send_timeout_secs == 0 {
            return Err(DuebellError::ConfigIncomplete(
                "send_timeout_secs must be at least 1".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(DuebellError::ConfigIncomplete(
                "max_concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DuebellError::ConfigIncomplete(format!("{key} is not a number: '{value}'")))
}

/// Where tasks and subscriptions are read from, chosen by URL scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// PostgREST / Supabase project URL.
    Rest { url: String },
    /// `sqlite://<path>`
    Sqlite { path: PathBuf },
    /// `file://<path>`, a JSON snapshot.
    File { path: PathBuf },
}

impl StoreLocation {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if let Some(path) = url.strip_prefix("sqlite://") {
            return Ok(Self::Sqlite { path: PathBuf::from(path) });
        }
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(Self::File { path: PathBuf::from(path) });
        }
        if url.starts_with("https://") || url.starts_with("http://") {
            reqwest::Url::parse(url)
                .map_err(|e| DuebellError::ConfigIncomplete(format!("Invalid store URL: {e}")))?;
            return Ok(Self::Rest {
                url: url.trim_end_matches('/').to_string(),
            });
        }
        Err(DuebellError::ConfigIncomplete(format!(
            "Unsupported store URL scheme: '{url}' (expected https://, sqlite:// or file://)"
        )))
    }
}

/// VAPID credentials for the push transport.
#[derive(Clone)]
pub struct VapidConfig {
    /// base64url uncompressed P-256 public key.
    pub public_key: String,
    /// base64url raw P-256 private scalar.
    pub private_key: String,
    /// Contact address: `mailto:` or `https://`.
    pub subject: String,
}

impl fmt::Debug for VapidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidConfig")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("subject", &self.subject)
            .finish()
    }
}

impl VapidConfig {
    fn validate(&self) -> Result<()> {
        if !(self.subject.starts_with("mailto:") || self.subject.starts_with("https://")) {
            return Err(DuebellError::ConfigIncomplete(format!(
                "{ENV_VAPID_SUBJECT} must be a mailto: or https: contact, got '{}'",
                self.subject
            )));
        }
        match decode_base64url(&self.public_key) {
            Some(bytes) if bytes.len() == 65 && bytes[0] == 0x04 => {}
            _ => {
                return Err(DuebellError::ConfigIncomplete(format!(
                    "{ENV_VAPID_PUBLIC_KEY} is not a base64url uncompressed P-256 key"
                )));
            }
        }
        match decode_base64url(&self.private_key) {
            Some(bytes) if bytes.len() == 32 => Ok(()),
            _ => Err(DuebellError::ConfigIncomplete(format!(
                "{ENV_VAPID_PRIVATE_KEY} is not a base64url 32-byte P-256 key"
            ))),
        }
    }
}

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct DuebellConfig {
    pub store: StoreLocation,
    pub store_key: String,
    pub vapid: VapidConfig,
    pub dispatch: DispatchConfig,
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest { url } => write!(f, "{url}"),
            Self::Sqlite { path } => write!(f, "sqlite://{}", path.display()),
            Self::File { path } => write!(f, "file://{}", path.display()),
        }
    }
}

impl DuebellConfig {
    /// Resolve from the process environment.
    pub fn from_env(dispatch: DispatchConfig) -> Result<Self> {
        Self::from_lookup(dispatch, |key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    ///
    /// Every missing required variable is reported at once; nothing is
    /// queried or sent before this succeeds.
    pub fn from_lookup<F>(mut dispatch: DispatchConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
        };

        let store_url = get(&[ENV_STORE_URL, ENV_SUPABASE_URL]);
        let store_key = get(&[ENV_STORE_KEY, ENV_SUPABASE_KEY]);
        let public_key = get(&[ENV_VAPID_PUBLIC_KEY]);
        let private_key = get(&[ENV_VAPID_PRIVATE_KEY]);
        let subject = get(&[ENV_VAPID_SUBJECT]);

        let mut missing = Vec::new();
        if store_url.is_none() {
            missing.push(ENV_STORE_URL);
        }
        if store_key.is_none() {
            missing.push(ENV_STORE_KEY);
        }
        if public_key.is_none() {
            missing.push(ENV_VAPID_PUBLIC_KEY);
        }
        if private_key.is_none() {
            missing.push(ENV_VAPID_PRIVATE_KEY);
        }
        if subject.is_none() {
            missing.push(ENV_VAPID_SUBJECT);
        }

        let (Some(store_url), Some(store_key), Some(public_key), Some(private_key), Some(subject)) =
            (store_url, store_key, public_key, private_key, subject)
        else {
            return Err(DuebellError::ConfigIncomplete(format!(
                "Missing environment variables: {}",
                missing.join(", ")
            )));
        };

        let vapid = VapidConfig {
            public_key,
            private_key,
            subject,
        };
        vapid.validate()?;

        dispatch.apply_env(&lookup)?;
        dispatch.validate()?;

        Ok(Self {
            store: StoreLocation::parse(&store_url)?,
            store_key,
            vapid,
            dispatch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const PUBLIC_KEY: &str =
        "BMjQIp55pdbU8pfCBKyXcZjlmER_mXt5LqNrN1hrXbdBS5EnhIbMu3Au-RV53iIpztzNXkGI56BFB1udQ8Bq_H4";
    const PRIVATE_KEY: &str = "IQ9Ur0ykXoHS9gzfYX0aBjy9lvdrjx_PFUXmie9YRcY";

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            (ENV_STORE_URL, "https://abc.supabase.co/"),
            (ENV_STORE_KEY, "service-key"),
            (ENV_VAPID_PUBLIC_KEY, PUBLIC_KEY),
            (ENV_VAPID_PRIVATE_KEY, PRIVATE_KEY),
            (ENV_VAPID_SUBJECT, "mailto:ops@example.com"),
        ])
    }

    fn resolve(vars: &HashMap<String, String>) -> Result<DuebellConfig> {
        DuebellConfig::from_lookup(DispatchConfig::default(), |k| vars.get(k).cloned())
    }

    #[test]
    fn test_default_dispatch_config() {
        let config = DispatchConfig::default();
        assert_eq!(config.policy, SubscriptionPolicy::Linked);
        assert_eq!(config.tag_mode, TagMode::TaskId);
        assert_eq!(config.send_timeout_secs, 10);
        assert_eq!(config.icon, "/icons/Icon-192.png");
    }

    #[test]
    fn test_dispatch_config_from_toml() {
        let config: DispatchConfig = toml::from_str(
            r#"
            policy = "broadcast"
            tag_mode = "task_id_and_due"
            title_mode = "task_name"
            max_concurrency = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.policy, SubscriptionPolicy::Broadcast);
        assert_eq!(config.tag_mode, TagMode::TaskIdAndDue);
        assert_eq!(config.title_mode, TitleMode::TaskName);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.title, "Task Reminder");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: DispatchConfig = toml::from_str("").unwrap();
        assert_eq!(config.ttl_secs, 86_400);
        assert_eq!(config.body_prefix, "Time to do");
    }

    #[test]
    fn test_full_env_resolves() {
        let config = resolve(&full_env()).unwrap();
        assert_eq!(
            config.store,
            StoreLocation::Rest { url: "https://abc.supabase.co".into() }
        );
        assert_eq!(config.store_key, "service-key");
        assert_eq!(config.vapid.subject, "mailto:ops@example.com");
    }

    #[test]
    fn test_missing_values_are_all_reported() {
        let mut vars = full_env();
        vars.remove(ENV_VAPID_SUBJECT);
        vars.insert(ENV_STORE_KEY.into(), "   ".into());

        let err = resolve(&vars).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, DuebellError::ConfigIncomplete(_)));
        assert!(message.contains(ENV_VAPID_SUBJECT));
        assert!(message.contains(ENV_STORE_KEY));
        assert!(!message.contains(ENV_VAPID_PUBLIC_KEY));
    }

    #[test]
    fn test_supabase_aliases() {
        let mut vars = full_env();
        vars.remove(ENV_STORE_URL);
        vars.remove(ENV_STORE_KEY);
        vars.insert(ENV_SUPABASE_URL.into(), "https://xyz.supabase.co".into());
        vars.insert(ENV_SUPABASE_KEY.into(), "legacy-key".into());

        let config = resolve(&vars).unwrap();
        assert_eq!(config.store_key, "legacy-key");
    }

    #[test]
    fn test_subject_must_be_contact() {
        let mut vars = full_env();
        vars.insert(ENV_VAPID_SUBJECT.into(), "ops@example.com".into());
        assert!(matches!(resolve(&vars), Err(DuebellError::ConfigIncomplete(_))));
    }

    #[test]
    fn test_malformed_vapid_keys_rejected() {
        let mut vars = full_env();
        vars.insert(ENV_VAPID_PRIVATE_KEY.into(), "short".into());
        assert!(resolve(&vars).is_err());

        let mut vars = full_env();
        vars.insert(ENV_VAPID_PUBLIC_KEY.into(), PRIVATE_KEY.into());
        assert!(resolve(&vars).is_err());
    }

    #[test]
    fn test_env_overrides_dispatch() {
        let mut vars = full_env();
        vars.insert("DUEBELL_POLICY".into(), "Broadcast".into());
        vars.insert("DUEBELL_SEND_TIMEOUT_SECS".into(), "3".into());
        let config = resolve(&vars).unwrap();
        assert_eq!(config.dispatch.policy, SubscriptionPolicy::Broadcast);
        assert_eq!(config.dispatch.send_timeout_secs, 3);

        vars.insert("DUEBELL_POLICY".into(), "sometimes".into());
        assert!(resolve(&vars).is_err());
    }

    #[test]
    fn test_env_overrides_display_strings() {
        let mut vars = full_env();
        vars.insert("DUEBELL_TITLE".into(), "Chores".into());
        vars.insert("DUEBELL_BODY_PREFIX".into(), "Don't forget".into());
        vars.insert("DUEBELL_ICON".into(), "/icons/bell.png".into());
        vars.insert("DUEBELL_BADGE".into(), "".into());
        let config = resolve(&vars).unwrap();
        assert_eq!(config.dispatch.title, "Chores");
        assert_eq!(config.dispatch.body_prefix, "Don't forget");
        assert_eq!(config.dispatch.icon, "/icons/bell.png");
        assert_eq!(config.dispatch.badge, "");

        vars.insert("DUEBELL_TITLE".into(), "  ".into());
        vars.remove("DUEBELL_BADGE");
        let config = resolve(&vars).unwrap();
        assert_eq!(config.dispatch.title, "Task Reminder");
        assert_eq!(config.dispatch.badge, "/icons/Icon-192.png");
    }

    fn temp_config(name: &str, contents: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("duebell-config-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_from_file() {
        let (dir, path) = temp_config("ok", "policy = \"broadcast\"\nsend_timeout_secs = 5\n");
        let config = DispatchConfig::load_from(&path).unwrap();
        assert_eq!(config.policy, SubscriptionPolicy::Broadcast);
        assert_eq!(config.send_timeout_secs, 5);
        assert_eq!(config.title, "Task Reminder");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_file_is_config_incomplete() {
        let (dir, path) = temp_config("malformed", "policy = [unterminated");
        let err = DispatchConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, DuebellError::ConfigIncomplete(_)));

        std::fs::write(&path, "policy = \"sometimes\"").unwrap();
        assert!(matches!(
            DispatchConfig::load_from(&path),
            Err(DuebellError::ConfigIncomplete(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_explicit_file_is_config_incomplete() {
        let err = DispatchConfig::load_from(Path::new("/nonexistent/duebell/config.toml")).unwrap_err();
        assert!(matches!(err, DuebellError::ConfigIncomplete(ref m) if m.contains("Failed to read")));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut vars = full_env();
        vars.insert("DUEBELL_MAX_CONCURRENCY".into(), "0".into());
        assert!(resolve(&vars).is_err());
    }

    #[test]
    fn test_store_location_schemes() {
        assert_eq!(
            StoreLocation::parse("sqlite:///var/lib/duebell.db").unwrap(),
            StoreLocation::Sqlite { path: PathBuf::from("/var/lib/duebell.db") }
        );
        assert_eq!(
            StoreLocation::parse("file://./snapshot.json").unwrap(),
            StoreLocation::File { path: PathBuf::from("./snapshot.json") }
        );
        assert!(StoreLocation::parse("ftp://example.com").is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = resolve(&full_env()).unwrap();
        let printed = format!("{:?}", config.vapid);
        assert!(!printed.contains(PRIVATE_KEY));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_home_dir() {
        let home = DispatchConfig::home_dir();
        assert!(home.to_string_lossy().contains("duebell"));
    }
}
