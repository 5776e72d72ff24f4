use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod store;

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mods: ModsConfig,
    #[serde(default)]
    pub shells: ShellsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModsConfig {
    /// Directory scanned for loadable units; created on first start
    pub directory: Option<PathBuf>,

    /// Safe mode disables all mod loading and unloading for the session
    #[serde(default)]
    pub safe_mode: bool,

    /// Key-value store file backing the blacklist
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellsConfig {
    /// Built-in command names for the main interactive shell
    #[serde(default = "default_main_builtins")]
    pub main_builtins: Vec<String>,

    /// Built-in command names for the FTP shell
    #[serde(default = "default_ftp_builtins")]
    pub ftp_builtins: Vec<String>,

    /// Built-in command names for the mail shell
    #[serde(default = "default_mail_builtins")]
    pub mail_builtins: Vec<String>,
}

fn default_main_builtins() -> Vec<String> {
    ["help", "ls", "cd", "cat", "clear", "exit"]
        .map(String::from)
        .to_vec()
}

fn default_ftp_builtins() -> Vec<String> {
    ["get", "put", "ls", "quit"].map(String::from).to_vec()
}

fn default_mail_builtins() -> Vec<String> {
    ["read", "send", "delete", "quit"].map(String::from).to_vec()
}

impl Default for ModsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            safe_mode: false,
            store_path: None,
        }
    }
}

impl Default for ShellsConfig {
    fn default() -> Self {
        Self {
            main_builtins: default_main_builtins(),
            ftp_builtins: default_ftp_builtins(),
            mail_builtins: default_mail_builtins(),
        }
    }
}

impl Config {
    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        fs::write(path.as_ref(), contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get default configuration path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.yaml"))
    }

    /// Effective mods directory, defaulting to `~/.kiln/mods`
    pub fn mods_dir(&self) -> Result<PathBuf> {
        match &self.mods.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::home_dir()?.join("mods")),
        }
    }

    /// Effective store path, defaulting to `~/.kiln/store.yaml`
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.mods.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::home_dir()?.join("store.yaml")),
        }
    }

    fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Failed to get home directory")?;
        Ok(home.join(".kiln"))
    }
}
