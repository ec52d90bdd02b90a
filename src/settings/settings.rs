use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub store: Store,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub users: Vec<User>,
}

/// Keeps secrets out of `Debug` output and therefore out of the logs.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<unset>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    /// Used only when `JWT_SIGNING_KEY` is not set.
    pub jwt_secret: Secret,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub lock_timeout_secs: u64,
    pub single_session: bool,
    pub rotate_refresh_tokens: bool,
    pub verifier_timeout_ms: u64,
    pub credentials: String, // "fake" or "real"
}

impl Default for Auth {
    fn default() -> Self {
        Auth {
            issuer: "sessiongate".to_string(),
            audience: "sessiongate-client".to_string(),
            jwt_secret: Secret::default(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            session_ttl_secs: 7 * 24 * 60 * 60,
            lock_timeout_secs: 600,
            single_session: true,
            rotate_refresh_tokens: false,
            verifier_timeout_ms: 2000,
            credentials: "fake".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Store {
    pub backend: String, // "redis" or "memory"
    pub dsn: Secret,
    pub op_timeout_ms: u64,
}

impl Default for Store {
    fn default() -> Self {
        Store {
            backend: "memory".to_string(),
            dsn: Secret("redis://127.0.0.1:6379".to_string()),
            op_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            address: "127.0.0.1:3000".to_string(),
            cert_path: None,
            key_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Log {
    pub filter: String,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            filter: "info".to_string(),
        }
    }
}

/// One row of the Argon2 verifier's user table.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub password_hash: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// `SESSIONGATE_AUTH__SINGLE_SESSION=false` style variables override the file.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("SESSIONGATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(raw: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_file_falls_back_to_defaults() {
        let settings = from_toml("");
        assert_eq!(settings.auth.access_ttl_secs, 900);
        assert_eq!(settings.auth.session_ttl_secs, 604_800);
        assert_eq!(settings.auth.lock_timeout_secs, 600);
        assert!(settings.auth.single_session);
        assert!(!settings.auth.rotate_refresh_tokens);
        assert_eq!(settings.store.backend, "memory");
        assert_eq!(settings.store.op_timeout_ms, 2000);
        assert!(settings.users.is_empty());
    }

    #[test]
    fn users_table_and_overrides() {
        let settings = from_toml(
            r#"
            [auth]
            session_ttl_secs = 900
            rotate_refresh_tokens = true
            jwt_secret = "hunter2"

            [[users]]
            user_id = "42"
            username = "alice"
            password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
            "#,
        );
        assert_eq!(settings.auth.session_ttl_secs, 900);
        assert!(settings.auth.rotate_refresh_tokens);
        assert_eq!(settings.auth.jwt_secret.expose(), "hunter2");
        assert_eq!(settings.users[0].username, "alice");
        assert!(!format!("{:?}", settings.auth).contains("hunter2"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }
}
