//! Daemon settings read from `$XDG_CONFIG_HOME/tunedmode/tunedmode.ini`.

use std::path::Path;

use ini::Ini;

use crate::error::Error;

const CONFIG_FILE: &str = "tunedmode.ini";
const TUNED_SECTION: &str = "tuned";
const GAMING_PROFILE_KEY: &str = "gaming-profile";
const DEFAULT_GAMING_PROFILE: &str = "latency-performance";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Profile to activate while at least one game is registered.
    pub gaming_profile: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gaming_profile: DEFAULT_GAMING_PROFILE.to_owned(),
        }
    }
}

impl Config {
    /// Reads the configuration, writing a file populated with the defaults
    /// first when none exists yet.
    pub fn load() -> Result<Self, Error> {
        let path =
            xdg::BaseDirectories::with_prefix("tunedmode").place_config_file(CONFIG_FILE)?;
        Self::load_path(&path)
    }

    fn load_path(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            let config = Self::default();
            config.write_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }
        Ok(Self::from_ini(&Ini::load_from_file(path)?))
    }

    fn from_ini(ini: &Ini) -> Self {
        let gaming_profile = ini
            .get_from(Some(TUNED_SECTION), GAMING_PROFILE_KEY)
            .unwrap_or(DEFAULT_GAMING_PROFILE)
            .to_owned();
        Self { gaming_profile }
    }

    fn write_to(&self, path: &Path) -> Result<(), Error> {
        let mut ini = Ini::new();
        ini.with_section(Some(TUNED_SECTION))
            .set(GAMING_PROFILE_KEY, self.gaming_profile.as_str());
        ini.write_to_file(path)?;
        Ok(())
    }
}
