use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Whether a profile edit must carry a fresh avatar image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarPolicy {
    /// Every edit must upload an image.
    Required,
    /// An edit without an image keeps the current avatar.
    Optional,
}

impl FromStr for AvatarPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "optional" => Ok(Self::Optional),
            other => anyhow::bail!("unknown avatar policy {other:?} (expected required|optional)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub default_avatar: String,
    pub avatar_on_edit: AvatarPolicy,
    pub password_min_length: usize,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "pollbox".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "pollbox-users".into()),
            ttl_minutes: parse_or("SESSION_TTL_MINUTES", 60 * 24 * 14)?,
        };
        let session = SessionConfig {
            cookie_name: std::env::var("SESSION_COOKIE").unwrap_or_else(|_| "sessionid".into()),
            cookie_secure: parse_or("COOKIE_SECURE", false)?,
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".into()),
            bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "pollbox".into()),
            access_key: std::env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".into()),
            secret_key: std::env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".into()),
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            session,
            storage,
            default_avatar: std::env::var("DEFAULT_AVATAR")
                .unwrap_or_else(|_| "avatars/default.jpg".into()),
            avatar_on_edit: parse_or("AVATAR_ON_EDIT", AvatarPolicy::Required)?,
            password_min_length: parse_or("PASSWORD_MIN_LENGTH", 8)?,
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_policy_parses_case_insensitively() {
        assert_eq!("Required".parse::<AvatarPolicy>().unwrap(), AvatarPolicy::Required);
        assert_eq!(" optional ".parse::<AvatarPolicy>().unwrap(), AvatarPolicy::Optional);
        assert!("sometimes".parse::<AvatarPolicy>().is_err());
    }

    #[test]
    fn parse_or_falls_back_when_unset() {
        let v: usize = parse_or("POLLBOX_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(v, 42);
    }
}
