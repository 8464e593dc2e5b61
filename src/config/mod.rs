mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{AmqpSettings, LogSettings, ServerSettings, Settings};

/// Prefix for environment overrides, e.g. `RELAYCHAT__SERVER__PORT=8080`.
pub const ENV_PREFIX: &str = "RELAYCHAT";

/// Loads `config/default.*` (optional) and environment overrides, merged
/// over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] with an explicit file stem.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
