use anyhow::{Context, Result};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/tubegrab-env";
pub const DEFAULT_RESOLVER_PROGRAM: &str = "yt-dlp";
pub const DEFAULT_FALLBACK_RESOLVER: &str = "youtube-dl";
pub const STATE_DB_FILE: &str = "state.db";

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub state_db: Option<PathBuf>,
    pub resolver_program: Option<String>,
    pub fallback_resolver: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub state_db: PathBuf,
    pub resolver_program: String,
    pub fallback_resolver: Option<String>,
    /// Language used until the user saves one of their own.
    pub language: Option<String>,
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "STATE_DB" => cfg.state_db = Some(PathBuf::from(value)),
                "RESOLVER_PROGRAM" => cfg.resolver_program = Some(value.to_string()),
                // "none" disables the fallback entirely.
                "FALLBACK_RESOLVER" => cfg.fallback_resolver = Some(value.to_string()),
                "LANGUAGE" => cfg.language = Some(value.to_ascii_lowercase()),
                _ => {}
            }
        }
    }
    Ok(Some(cfg))
}

pub fn load_runtime_config() -> Result<RuntimeConfig> {
    load_runtime_config_from(Path::new(DEFAULT_CONFIG_PATH))
}

/// Unlike the state DB, a missing config file is fine: every key has a
/// default.
pub fn load_runtime_config_from(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let cfg = read_env_config(path.as_ref())?.unwrap_or_default();
    let state_db = cfg.state_db.unwrap_or_else(default_state_db);
    let resolver_program = cfg
        .resolver_program
        .unwrap_or_else(|| DEFAULT_RESOLVER_PROGRAM.to_string());
    let fallback_resolver = match cfg.fallback_resolver.as_deref() {
        Some("none") => None,
        Some(value) => Some(value.to_string()),
        None => Some(DEFAULT_FALLBACK_RESOLVER.to_string()),
    };
    Ok(RuntimeConfig {
        state_db,
        resolver_program,
        fallback_resolver,
        language: cfg.language,
    })
}

/// `$XDG_DATA_HOME/tubegrab/state.db`, then `~/.local/share/...`, then the
/// working directory.
pub fn default_state_db() -> PathBuf {
    if let Some(data_home) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(data_home).join("tubegrab").join(STATE_DB_FILE);
    }
    if let Some(home) = env::var_os("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("tubegrab")
            .join(STATE_DB_FILE);
    }
    PathBuf::from("tubegrab-state.db")
}
