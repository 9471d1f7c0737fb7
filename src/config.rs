//! Environment-driven server configuration.
//!
//! All knobs come from `ATRIUM_*` environment variables with workable
//! defaults. Administrative keys are optional; endpoints gated on an
//! unconfigured key answer 501 rather than falling back to an insecure
//! default.

use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the shared tree. Everything served lives beneath it.
    pub public_dir: PathBuf,
    /// Where the folder-key and visibility JSON files live.
    pub config_dir: PathBuf,
    pub http_port: u16,
    /// Global key accepted for uploads and folder administration.
    pub upload_key: Option<String>,
    /// Key required by the deletion endpoint.
    pub delete_key: Option<String>,
    /// Key required to hide/unhide folders and toggle hidden viewing.
    pub hidden_key: Option<String>,
    pub max_upload_bytes: usize,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let max_upload_mb: usize = env_or("ATRIUM_MAX_UPLOAD_MB", "1024").parse().unwrap_or(1024);
        Self {
            public_dir: PathBuf::from(env_or("ATRIUM_PUBLIC_DIR", "./public")),
            config_dir: PathBuf::from(env_or("ATRIUM_CONFIG_DIR", ".")),
            http_port: env_or("ATRIUM_HTTP_PORT", "8000").parse().unwrap_or(8000),
            upload_key: env_opt("ATRIUM_UPLOAD_KEY"),
            delete_key: env_opt("ATRIUM_DELETE_KEY"),
            hidden_key: env_opt("ATRIUM_HIDDEN_KEY"),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        }
    }

    pub fn folder_keys_file(&self) -> PathBuf {
        self.config_dir.join("folder_keys.json")
    }

    pub fn visibility_file(&self) -> PathBuf {
        self.config_dir.join("folder_visibility.json")
    }

    pub fn delete_key_configured(&self) -> bool {
        self.delete_key.is_some()
    }

    pub fn hidden_key_configured(&self) -> bool {
        self.hidden_key.is_some()
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.public_dir)
            .with_context(|| format!("Failed to create public dir: {}", self.public_dir.display()))?;
        std::fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("Failed to create config dir: {}", self.config_dir.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_paths_live_under_config_dir() {
        let cfg = Config {
            public_dir: PathBuf::from("/srv/public"),
            config_dir: PathBuf::from("/srv/conf"),
            http_port: 8000,
            upload_key: None,
            delete_key: Some("d".into()),
            hidden_key: None,
            max_upload_bytes: 1024,
        };
        assert_eq!(cfg.folder_keys_file(), PathBuf::from("/srv/conf/folder_keys.json"));
        assert_eq!(cfg.visibility_file(), PathBuf::from("/srv/conf/folder_visibility.json"));
        assert!(cfg.delete_key_configured());
        assert!(!cfg.hidden_key_configured());
    }
}
