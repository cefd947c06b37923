use crate::error::{StudioError, StudioResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const API_KEY_ENV: &str = "DIARY_STUDIO_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Env,
    CredentialsFile,
}

impl CredentialSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::CredentialsFile => "credentials",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub api_key: String,
    pub source: CredentialSource,
}

impl Credential {
    pub fn masked(&self) -> String {
        mask_api_key(&self.api_key)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &self.masked())
            .field("source", &self.source)
            .finish()
    }
}

/// Where the sync gate gets its API key from.
pub trait CredentialResolver {
    /// `Ok(None)` means nothing is configured; `Err` means a configured
    /// source exists but could not be read.
    fn resolve(&self) -> StudioResult<Option<Credential>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default, alias = "apiKey")]
    api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

/// An env var first, then `credentials.json`.
#[derive(Debug, Clone)]
pub struct EnvOrFileCredentials {
    env_key: Option<String>,
    file: PathBuf,
}

impl EnvOrFileCredentials {
    pub fn new(env_key: Option<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            env_key: env_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            file: file.into(),
        }
    }

    pub fn from_env(file: impl Into<PathBuf>) -> Self {
        Self::new(std::env::var(API_KEY_ENV).ok(), file)
    }
}

impl CredentialResolver for EnvOrFileCredentials {
    fn resolve(&self) -> StudioResult<Option<Credential>> {
        if let Some(key) = &self.env_key {
            return Ok(Some(Credential {
                api_key: key.clone(),
                source: CredentialSource::Env,
            }));
        }
        if !self.file.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.file)
            .map_err(|err| StudioError::delegate("resolve_api_key_state", format!("read credentials: {err}")))?;
        let parsed: CredentialsFile = serde_json::from_str(&raw).map_err(|err| {
            StudioError::delegate("resolve_api_key_state", format!("parse credentials json: {err}"))
        })?;
        let key = parsed.api_key.trim();
        if key.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credential {
            api_key: key.to_string(),
            source: CredentialSource::CredentialsFile,
        }))
    }
}

/// Persist `api_key` to `path`, readable by the owner only.
pub fn save_api_key(path: &Path, api_key: &str, updated_at: &str) -> StudioResult<()> {
    let key = api_key.trim();
    if key.is_empty() {
        return Err(StudioError::validation("api key is empty"));
    }
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let body = CredentialsFile {
        api_key: key.to_string(),
        updated_at: Some(updated_at.to_string()),
    };
    let json = serde_json::to_string_pretty(&body)
        .map_err(|err| StudioError::delegate("save_credentials", err))?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(json.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

pub fn mask_api_key(input: &str) -> String {
    let chars = input.trim().chars().collect::<Vec<_>>();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let head = chars[..3].iter().collect::<String>();
    let tail = chars[chars.len() - 3..].iter().collect::<String>();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn env_key_wins_over_file() {
        let tmp = tempdir().expect("tempdir");
        let file = tmp.path().join("credentials.json");
        fs::write(&file, r#"{"api_key":"from-file-123"}"#).expect("write creds");
        let resolver = EnvOrFileCredentials::new(Some(" env-key-abcdef ".into()), &file);
        let cred = resolver.resolve().expect("resolve").expect("configured");
        assert_eq!(cred.api_key, "env-key-abcdef");
        assert_eq!(cred.source.as_str(), "env");
    }

    #[test]
    fn missing_file_is_not_configured() {
        let tmp = tempdir().expect("tempdir");
        let resolver = EnvOrFileCredentials::new(None, tmp.path().join("credentials.json"));
        assert!(resolver.resolve().expect("resolve").is_none());
    }

    #[test]
    fn broken_file_is_a_delegate_failure() {
        let tmp = tempdir().expect("tempdir");
        let file = tmp.path().join("credentials.json");
        fs::write(&file, "{not json").expect("write creds");
        let err = EnvOrFileCredentials::new(None, &file)
            .resolve()
            .expect_err("must fail");
        assert!(matches!(
            err,
            StudioError::Delegate {
                stage: "resolve_api_key_state",
                ..
            }
        ));
    }

    #[test]
    fn saved_key_resolves_from_file() {
        let tmp = tempdir().expect("tempdir");
        let file = tmp.path().join("credentials.json");
        save_api_key(&file, "  key-from-settings ", "2026-02-20T00:00:00.000Z").expect("save");
        let cred = EnvOrFileCredentials::new(None, &file)
            .resolve()
            .expect("resolve")
            .expect("configured");
        assert_eq!(cred.api_key, "key-from-settings");
        assert_eq!(cred.source, CredentialSource::CredentialsFile);
    }

    #[test]
    fn masking_keeps_three_chars_each_side() {
        assert_eq!(mask_api_key("abcdefghij"), "abc****hij");
        assert_eq!(mask_api_key("short"), "*****");
        let cred = Credential {
            api_key: "abcdefghij".into(),
            source: CredentialSource::Env,
        };
        assert!(!format!("{cred:?}").contains("defg"));
    }
}
