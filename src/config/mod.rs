mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{LogSettings, ServerSettings, Settings};

/// Prefix for environment overrides, e.g. `SUBPUB_SERVER__PORT=6000`.
pub const ENV_PREFIX: &str = "SUBPUB";

/// Loads the configuration from `path` (if it exists) and from environment
/// variables, then merges the result with default values.
///
/// The file format follows the extension (`config.json`, `config.toml`, ...).
/// A missing file is not an error; a malformed one is.
pub fn load_config(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::from(path.as_ref()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
