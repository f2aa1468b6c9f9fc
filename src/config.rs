//! Startup configuration: the account set, the virtual-folder mapping and the
//! token signing secret. Loaded once from a TOML file and injected everywhere
//! as an immutable snapshot; nothing here changes after boot.

use anyhow::{bail, Context, Result};
use path_absolutize::Absolutize;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A configured account. The password is stored as an Argon2 PHC string
/// (salt embedded); `vpaths` names the virtual folders this account may browse.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub password_hash: String,
    #[serde(default)]
    pub vpaths: Vec<String>,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Process-wide token signing secret.
    pub secret: String,
    /// Username -> account. May be empty: that enables the no-login
    /// single-operator mode.
    #[serde(default)]
    pub users: HashMap<String, Account>,
    /// Virtual folder name -> real base directory.
    pub folders: HashMap<String, PathBuf>,
    /// Lowercase file extensions served and listed as media.
    #[serde(default = "default_media_types")]
    pub supported_media_types: HashSet<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 { 3000 }

fn default_media_types() -> HashSet<String> {
    ["mp3", "flac", "wav", "ogg", "aac", "m4a", "opus", "wma"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    /// Load and validate a config file. Folder paths are absolutized here so
    /// every later containment check compares against a canonical root.
    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        if config.secret.trim().is_empty() {
            bail!("config 'secret' must not be empty");
        }
        if config.folders.is_empty() {
            bail!("config must declare at least one [folders] entry");
        }

        let mut folders = HashMap::with_capacity(config.folders.len());
        for (name, dir) in config.folders.drain() {
            let abs = dir
                .absolutize()
                .with_context(|| format!("failed to absolutize folder '{}'", name))?
                .to_path_buf();
            if !abs.is_dir() {
                bail!("folder '{}' does not exist or is not a directory: {}", name, abs.display());
            }
            folders.insert(name, abs);
        }
        config.folders = folders;

        for (username, account) in &config.users {
            for vpath in &account.vpaths {
                if !config.folders.contains_key(vpath) {
                    bail!("user '{}' references unknown folder '{}'", username, vpath);
                }
            }
        }

        Ok(config)
    }

    pub fn lookup(&self, username: &str) -> Option<&Account> {
        self.users.get(username)
    }

    pub fn no_users(&self) -> bool {
        self.users.is_empty()
    }

    pub fn folder_names(&self) -> HashSet<String> {
        self.folders.keys().cloned().collect()
    }

    pub fn folder(&self, vpath: &str) -> Option<&Path> {
        self.folders.get(vpath).map(|p| p.as_path())
    }

    pub fn is_supported_media(&self, extension: &str) -> bool {
        self.supported_media_types.contains(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("tonearm.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn load_parses_accounts_and_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let music = tmp.path().join("music");
        std::fs::create_dir(&music).unwrap();
        let body = format!(
            r#"
secret = "test-secret"
port = 3333

[folders]
music = "{}"

[users.alice]
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$x"
vpaths = ["music"]
admin = true
"#,
            music.display()
        );
        let path = write_config(tmp.path(), &body);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.port, 3333);
        assert!(config.lookup("alice").unwrap().admin);
        assert_eq!(config.folder("music").unwrap(), music.as_path());
        assert!(config.is_supported_media("flac"));
        assert!(!config.is_supported_media("exe"));
    }

    #[test]
    fn load_rejects_unknown_vpath_reference() {
        let tmp = tempfile::tempdir().unwrap();
        let music = tmp.path().join("music");
        std::fs::create_dir(&music).unwrap();
        let body = format!(
            r#"
secret = "s"
[folders]
music = "{}"
[users.bob]
password_hash = "x"
vpaths = ["video"]
"#,
            music.display()
        );
        let path = write_config(tmp.path(), &body);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn load_rejects_missing_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let body = format!(
            r#"
secret = "s"
[folders]
music = "{}"
"#,
            tmp.path().join("nope").display()
        );
        let path = write_config(tmp.path(), &body);
        assert!(Config::load(&path).is_err());
    }
}
