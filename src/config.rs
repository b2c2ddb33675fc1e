//! Environment-driven configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_FILES_DIR: &str = "files";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Where images and sidecar records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local { root: PathBuf },
    Memory,
    Gcs { bucket: String, credentials: GcsCredentials },
}

/// How the GCS backend obtains bearer tokens.
#[derive(Clone, PartialEq, Eq)]
pub enum GcsCredentials {
    /// A fixed, short-lived token from `GCS_ACCESS_TOKEN`. It is never refreshed.
    Static(String),
    /// Tokens for the attached service account, fetched from the GCE metadata server.
    MetadataServer,
}

impl fmt::Debug for GcsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Static(<redacted>)"),
            Self::MetadataServer => f.write_str("MetadataServer"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct CaptionConfig {
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for CaptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptionConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub storage: StorageConfig,
    /// Captioning is disabled when no API key is configured.
    pub caption: Option<CaptionConfig>,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(value) => parse_var("PORT", value)?,
            None => DEFAULT_PORT,
        };

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(value) => parse_var("MAX_UPLOAD_BYTES", value)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let backend = var("STORAGE_BACKEND").unwrap_or_else(|| "local".to_string());
        let storage = match backend.trim().to_ascii_lowercase().as_str() {
            "local" => StorageConfig::Local {
                root: PathBuf::from(
                    var("FILES_DIR").unwrap_or_else(|| DEFAULT_FILES_DIR.to_string()),
                ),
            },
            "memory" => StorageConfig::Memory,
            "gcs" => StorageConfig::Gcs {
                bucket: var("GCS_BUCKET").ok_or(ConfigError::Missing("GCS_BUCKET"))?,
                credentials: var("GCS_ACCESS_TOKEN")
                    .map_or(GcsCredentials::MetadataServer, GcsCredentials::Static),
            },
            _ => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: backend,
                })
            }
        };

        let caption = var("GEMINI_API_KEY").map(|api_key| CaptionConfig {
            api_key,
            model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        });

        Ok(Self {
            port,
            storage,
            caption,
            max_upload_bytes,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|_| ConfigError::Invalid { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_to_local_store_without_captioning() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.storage,
            StorageConfig::Local {
                root: PathBuf::from("files")
            }
        );
        assert!(config.caption.is_none());
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn gemini_key_enables_captioning() {
        let config = config_from(&[("GEMINI_API_KEY", "k")]).unwrap();
        let caption = config.caption.unwrap();
        assert_eq!(caption.api_key, "k");
        assert_eq!(caption.model, "gemini-2.5-flash");
    }

    #[test]
    fn gcs_requires_bucket() {
        let err = config_from(&[("STORAGE_BACKEND", "gcs")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GCS_BUCKET"));
    }

    #[test]
    fn gcs_uses_metadata_server_unless_token_given() {
        let config = config_from(&[("STORAGE_BACKEND", "gcs"), ("GCS_BUCKET", "b")]).unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Gcs {
                bucket: "b".to_string(),
                credentials: GcsCredentials::MetadataServer,
            }
        );

        let config = config_from(&[
            ("STORAGE_BACKEND", "GCS"),
            ("GCS_BUCKET", "b"),
            ("GCS_ACCESS_TOKEN", "t"),
        ])
        .unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Gcs {
                bucket: "b".to_string(),
                credentials: GcsCredentials::Static("t".to_string()),
            }
        );
    }

    #[test]
    fn rejects_bad_port_and_backend() {
        assert!(matches!(
            config_from(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        assert!(matches!(
            config_from(&[("STORAGE_BACKEND", "s3")]),
            Err(ConfigError::Invalid {
                name: "STORAGE_BACKEND",
                ..
            })
        ));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("PORT", "  "), ("GEMINI_API_KEY", "")]).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.caption.is_none());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = config_from(&[
            ("STORAGE_BACKEND", "gcs"),
            ("GCS_BUCKET", "photos"),
            ("GCS_ACCESS_TOKEN", "ya29.secret"),
            ("GEMINI_API_KEY", "AIza-secret"),
        ])
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(rendered.contains("photos"));
        assert!(!rendered.contains("ya29.secret"));
        assert!(!rendered.contains("AIza-secret"));
    }
}
