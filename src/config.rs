use crate::error::{FormtraceError, FtResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tunables for a form session and its simulated backend. The change
/// sampling interval is policy, not protocol, so it lives here rather
/// than hard-coded in the tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub form_name: String,
    pub change_sample_every: u32,
    pub persist_delay_ms: u64,
    pub welcome_email_delay_ms: u64,
    pub conflict_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            form_name: "signup".to_string(),
            change_sample_every: 10,
            persist_delay_ms: 150,
            welcome_email_delay_ms: 50,
            conflict_rate: 0.1,
        }
    }
}

impl Config {
    pub fn validate(&self) -> FtResult<()> {
        if self.form_name.trim().is_empty() {
            return Err(FormtraceError::Config("form_name must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.conflict_rate) {
            return Err(FormtraceError::Config(format!(
                "conflict_rate must be within 0..=1, got {}",
                self.conflict_rate
            )));
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> FtResult<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "formtrace") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("formtrace_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> FtResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            form_name: "newsletter".into(),
            change_sample_every: 5,
            persist_delay_ms: 0,
            welcome_email_delay_ms: 0,
            conflict_rate: 0.5,
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nope.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{not json").unwrap();
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn validate_rejects_out_of_range_conflict_rate() {
        let cfg = Config {
            conflict_rate: 1.5,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }
}
