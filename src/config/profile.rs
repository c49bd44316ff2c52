//! Named YAML profiles stored in a configuration directory.
//!
//! The selected profile lives in `<dir>/.gsm.yaml`; every other profile in
//! `<dir>/<name>.yaml`. Switching renames the dot file back to its own name
//! and promotes the selected file.

use super::WorkspaceConfigBuilder;
use crate::errors::{ConfigurationError, WorkspaceResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// File name of the selected profile.
pub const ACTIVE_PROFILE_FILE: &str = ".gsm.yaml";

/// How the credentials file is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileMode {
    /// Interactive user credentials.
    #[default]
    User,
    /// Service account with domain-wide delegation.
    Dwd,
}

/// A named client profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile name.
    pub name: String,

    /// Path to the credentials file.
    #[serde(default)]
    pub credentials_file: String,

    /// Credential mode.
    #[serde(default)]
    pub mode: ProfileMode,

    /// Impersonated user for domain-wide delegation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Default worker count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    /// Standard delay in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_delay: Option<u64>,

    /// OAuth scopes requested with this profile.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// Whether this profile is the default one.
    #[serde(default)]
    pub default: bool,
}

impl Profile {
    /// Creates a profile with only a name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credentials_file: String::new(),
            mode: ProfileMode::default(),
            subject: None,
            threads: None,
            standard_delay: None,
            scopes: Vec::new(),
            default: false,
        }
    }

    /// Copies the profile's tuning values into a configuration builder.
    pub fn apply(&self, mut builder: WorkspaceConfigBuilder) -> WorkspaceConfigBuilder {
        if let Some(threads) = self.threads {
            builder = builder.threads(threads);
        }
        if let Some(delay) = self.standard_delay {
            builder = builder.standard_delay(Duration::from_millis(delay));
        }
        builder
    }
}

/// Profile files in one configuration directory.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// Creates a store over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the configuration directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_PROFILE_FILE)
    }

    fn named_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", name))
    }

    /// Loads the selected profile, if one is selected.
    pub fn load_active(&self) -> WorkspaceResult<Option<Profile>> {
        let path = self.active_path();
        if !path.exists() {
            return Ok(None);
        }
        read_profile(&path).map(Some)
    }

    /// Loads a profile by name.
    pub fn load(&self, name: &str) -> WorkspaceResult<Profile> {
        if let Some(active) = self.load_active()? {
            if active.name == name {
                return Ok(active);
            }
        }

        let path = self.named_path(name);
        if !path.exists() {
            return Err(ConfigurationError::ProfileNotFound(name.to_string()).into());
        }
        read_profile(&path)
    }

    /// Saves a profile, in place if it is the selected one.
    pub fn save(&self, profile: &Profile) -> WorkspaceResult<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(io_error)?;

        let path = match self.load_active()? {
            Some(active) if active.name == profile.name => self.active_path(),
            _ => self.named_path(&profile.name),
        };

        let yaml = serde_yaml::to_string(profile)
            .map_err(|e| ConfigurationError::Format(e.to_string()))?;
        fs::write(&path, yaml).map_err(io_error)?;
        debug!(profile = %profile.name, path = %path.display(), "Saved profile");
        Ok(path)
    }

    /// Lists every profile in the directory, the selected one included.
    pub fn list(&self) -> WorkspaceResult<Vec<Profile>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut profiles = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("yaml") {
                profiles.push(read_profile(&path)?);
            }
        }
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    /// Selects a profile, returning it.
    pub fn switch(&self, name: &str) -> WorkspaceResult<Profile> {
        let active = self.load_active()?;
        if let Some(active) = &active {
            if active.name == name {
                return Ok(active.clone());
            }
        }

        let target = self.named_path(name);
        if !target.exists() {
            return Err(ConfigurationError::ProfileNotFound(name.to_string()).into());
        }

        if let Some(active) = active {
            fs::rename(self.active_path(), self.named_path(&active.name)).map_err(io_error)?;
        }
        fs::rename(&target, self.active_path()).map_err(io_error)?;

        info!(profile = %name, "Switched profile");
        read_profile(&self.active_path())
    }

    /// Deletes a profile that is not selected.
    pub fn remove(&self, name: &str) -> WorkspaceResult<()> {
        if let Some(active) = self.load_active()? {
            if active.name == name {
                return Err(ConfigurationError::InvalidConfiguration(format!(
                    "Profile {} is selected; switch to another profile first",
                    name
                ))
                .into());
            }
        }

        let path = self.named_path(name);
        if !path.exists() {
            return Err(ConfigurationError::ProfileNotFound(name.to_string()).into());
        }
        fs::remove_file(path).map_err(io_error)?;
        Ok(())
    }
}

fn read_profile(path: &Path) -> WorkspaceResult<Profile> {
    let content = fs::read_to_string(path).map_err(io_error)?;
    serde_yaml::from_str(&content).map_err(|e| {
        ConfigurationError::Format(format!("{}: {}", path.display(), e)).into()
    })
}

fn io_error(err: std::io::Error) -> ConfigurationError {
    ConfigurationError::Io(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceConfig;

    fn profile(name: &str) -> Profile {
        Profile {
            credentials_file: format!("/etc/gsm/{}.json", name),
            mode: ProfileMode::Dwd,
            subject: Some("admin@example.com".to_string()),
            threads: Some(8),
            standard_delay: Some(250),
            ..Profile::new(name)
        }
    }

    #[test]
    fn test_yaml_keys() {
        let yaml = serde_yaml::to_string(&profile("prod")).unwrap();
        for key in ["name:", "credentialsFile:", "mode: dwd", "subject:", "threads:", "standardDelay:", "default:"] {
            assert!(yaml.contains(key), "missing {key} in {yaml}");
        }

        let parsed: Profile = serde_yaml::from_str(
            "name: test\ncredentialsFile: c.json\nmode: user\nscopes:\n  - a\n  - b\ndefault: true\n",
        )
        .unwrap();
        assert_eq!(parsed.scopes, vec!["a", "b"]);
        assert!(parsed.default);
        assert_eq!(parsed.threads, None);
    }

    #[test]
    fn test_save_load_and_switch() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        store.save(&profile("prod")).unwrap();
        store.save(&profile("test")).unwrap();
        assert!(store.load_active().unwrap().is_none());

        let selected = store.switch("prod").unwrap();
        assert_eq!(selected.name, "prod");
        assert!(dir.path().join(ACTIVE_PROFILE_FILE).exists());
        assert!(!dir.path().join("prod.yaml").exists());

        store.switch("test").unwrap();
        assert!(dir.path().join("prod.yaml").exists());
        assert!(!dir.path().join("test.yaml").exists());
        assert_eq!(store.load_active().unwrap().unwrap().name, "test");
        assert_eq!(store.load("test").unwrap().name, "test");
        assert_eq!(store.load("prod").unwrap().name, "prod");

        let names: Vec<_> = store.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["prod", "test"]);
    }

    #[test]
    fn test_save_selected_profile_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        store.save(&profile("prod")).unwrap();
        store.switch("prod").unwrap();

        let mut updated = profile("prod");
        updated.threads = Some(2);
        let path = store.save(&updated).unwrap();

        assert_eq!(path, dir.path().join(ACTIVE_PROFILE_FILE));
        assert_eq!(store.load_active().unwrap().unwrap().threads, Some(2));
    }

    #[test]
    fn test_switch_and_remove_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        assert!(store.switch("nope").is_err());
        assert!(store.remove("nope").is_err());

        store.save(&profile("prod")).unwrap();
        store.switch("prod").unwrap();
        assert!(store.remove("prod").is_err());
    }

    #[test]
    fn test_apply_to_builder() {
        let config = profile("prod")
            .apply(WorkspaceConfig::builder())
            .build()
            .unwrap();
        assert_eq!(config.threads, 8);
        assert_eq!(config.standard_delay, Duration::from_millis(250));
    }
}
