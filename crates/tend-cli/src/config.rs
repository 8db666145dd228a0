use anyhow::{Context, Result};
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Account the CLI acts as; a local profile id is used when unset
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// IANA timezone used to decide what "today" is
    #[serde(default = "detect_system_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub functions: FunctionsConfig,
}

/// Hosted text-completion functions
#[derive(Deserialize, Debug, Default)]
pub struct FunctionsConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

fn default_database_path() -> String {
    "tend.db".to_string()
}

impl Config {
    /// `config.toml` in the working directory, overridden by `TEND_*`
    /// variables (`TEND_FUNCTIONS__BASE_URL` for nested keys).
    pub fn new() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("TEND_").split("__"))
            .extract()
    }

    /// The configured user, or the profile id kept next to the database.
    pub fn resolve_user_id(&self) -> Result<Uuid> {
        match self.user_id {
            Some(id) => Ok(id),
            None => local_profile_id(&profile_path(&self.database_path)),
        }
    }
}

fn profile_path(database_path: &str) -> PathBuf {
    Path::new(database_path).with_extension("profile")
}

fn local_profile_id(path: &Path) -> Result<Uuid> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        return Uuid::parse_str(existing.trim())
            .with_context(|| format!("Profile file '{}' is corrupt", path.display()));
    }

    let id = Uuid::now_v7();
    std::fs::write(path, id.to_string())
        .with_context(|| format!("Could not write profile file '{}'", path.display()))?;
    tracing::info!(%id, path = %path.display(), "created local profile");
    Ok(id)
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if Tz::from_str(&tz).is_ok() {
            return tz;
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(tz) = std::fs::read_to_string("/etc/timezone") {
            let tz = tz.trim();
            if Tz::from_str(tz).is_ok() {
                return tz.to_string();
            }
        }
    }

    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if Tz::from_str(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}

/// Timezone names that contain `input`, for "did you mean" hints.
pub fn suggest_timezones(input: &str) -> Vec<&'static str> {
    let needle = input.to_lowercase();
    if needle.len() < 3 {
        return Vec::new();
    }
    chrono_tz::TZ_VARIANTS
        .iter()
        .map(|tz| tz.name())
        .filter(|name| name.to_lowercase().contains(&needle))
        .take(5)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_profile_id_is_created_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tend.profile");

        let first = local_profile_id(&path).unwrap();
        let second = local_profile_id(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_profile_sits_next_to_database() {
        assert_eq!(profile_path("/tmp/x/tend.db"), PathBuf::from("/tmp/x/tend.profile"));
    }

    #[test]
    fn test_suggest_timezones() {
        assert!(suggest_timezones("berlin").contains(&"Europe/Berlin"));
        assert!(suggest_timezones("x").is_empty());
    }
}
