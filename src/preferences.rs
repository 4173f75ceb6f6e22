//! User preferences that outlive any single download session.

use anyhow::{Result, bail};
use tracing::debug;

use crate::i18n::DEFAULT_LANGUAGE;
use crate::store::KeyValueStore;

pub const LANGUAGE_KEY: &str = "language";
pub const DEFAULT_RESOLUTION_KEY: &str = "defaultResolution";
pub const DEFAULT_FORMAT_KEY: &str = "defaultFormat";
pub const RESOLVER_PROGRAM_KEY: &str = "resolverProgram";

pub const DEFAULT_RESOLUTION: &str = "720p";
pub const DEFAULT_FORMAT: &str = "mp4";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub language: String,
    pub default_resolution: String,
    pub default_format: String,
    /// Replaces the configured resolver program when set.
    pub resolver_program: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            default_resolution: DEFAULT_RESOLUTION.to_string(),
            default_format: DEFAULT_FORMAT.to_string(),
            resolver_program: None,
        }
    }
}

impl Preferences {
    /// Reads every preference, using defaults for the ones never saved.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Result<Self> {
        let defaults = Self::default();
        let language = store
            .get(LANGUAGE_KEY)?
            .filter(|code| is_language_code(code))
            .unwrap_or(defaults.language);
        let default_resolution = store
            .get(DEFAULT_RESOLUTION_KEY)?
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.default_resolution);
        let default_format = store
            .get(DEFAULT_FORMAT_KEY)?
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.default_format);
        let resolver_program = store
            .get(RESOLVER_PROGRAM_KEY)?
            .filter(|value| !value.trim().is_empty());

        Ok(Self {
            language,
            default_resolution,
            default_format,
            resolver_program,
        })
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &S) -> Result<()> {
        store.set(LANGUAGE_KEY, &self.language)?;
        store.set(DEFAULT_RESOLUTION_KEY, &self.default_resolution)?;
        store.set(DEFAULT_FORMAT_KEY, &self.default_format)?;
        match &self.resolver_program {
            Some(program) => store.set(RESOLVER_PROGRAM_KEY, program)?,
            None => store.remove(RESOLVER_PROGRAM_KEY)?,
        }
        debug!(language = %self.language, "saved preferences");
        Ok(())
    }

    pub fn set_language(&mut self, code: &str) -> Result<()> {
        let code = code.trim().to_ascii_lowercase();
        if !is_language_code(&code) {
            bail!("language code must be two or three letters, got {code:?}");
        }
        self.language = code;
        Ok(())
    }

    pub fn set_defaults(&mut self, resolution: &str, format: &str) -> Result<()> {
        let (resolution, format) = (resolution.trim(), format.trim());
        if resolution.is_empty() || format.is_empty() {
            bail!("default resolution and format cannot be empty");
        }
        self.default_resolution = resolution.to_string();
        self.default_format = format.to_string();
        Ok(())
    }

    /// An empty value clears the override.
    pub fn set_resolver_program(&mut self, program: &str) {
        let program = program.trim();
        self.resolver_program = (!program.is_empty()).then(|| program.to_string());
    }
}

fn is_language_code(code: &str) -> bool {
    (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_lowercase())
}
