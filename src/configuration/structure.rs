use std::fs;
use std::path::{Path, PathBuf};

use miette::{miette, Context, IntoDiagnostic, Result};
use serde::Deserialize;
use tracing::debug;

pub use self::logging::LoggingConfiguration;
use self::logging::UnresolvedLoggingConfiguration;
pub use self::registry::RegistryConfiguration;
use self::registry::UnresolvedRegistryConfiguration;
use super::traits::{ResolvableConfiguration, ResolvableConfigurationWithContext};
use super::utilities::get_default_configuration_file_path;

mod logging;
mod registry;



#[derive(Deserialize, Debug, Default)]
pub(crate) struct UnresolvedConfiguration {
    /// Logging-related configuration.
    #[serde(default)]
    logging: UnresolvedLoggingConfiguration,

    /// Default registry settings.
    #[serde(default)]
    registry: UnresolvedRegistryConfiguration,
}


/// The entire configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// This is the file path this `Configuration` instance was loaded from.
    /// `None` if the built-in defaults are used.
    pub file_path: Option<PathBuf>,

    /// Logging-related configuration.
    pub logging: LoggingConfiguration,

    /// Default registry settings.
    pub registry: RegistryConfiguration,
}


impl ResolvableConfigurationWithContext for UnresolvedConfiguration {
    type Resolved = Configuration;
    type Context = Option<PathBuf>;

    fn resolve(self, context: Self::Context) -> Result<Self::Resolved> {
        let configuration_directory = context
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);

        let logging = self
            .logging
            .resolve(configuration_directory)
            .wrap_err("Failed to resolve logging table.")?;

        let registry = self
            .registry
            .resolve()
            .wrap_err("Failed to resolve registry table.")?;


        Ok(Configuration {
            file_path: context,
            logging,
            registry,
        })
    }
}


impl Configuration {
    /// Load the configuration from a specific file path.
    pub fn load_from_path<S: AsRef<Path>>(configuration_file_path: S) -> Result<Self> {
        // Read the configuration file into memory.
        let configuration_string = fs::read_to_string(configuration_file_path.as_ref())
            .into_diagnostic()
            .wrap_err_with(|| {
                miette!(
                    "Could not read configuration file at {}.",
                    configuration_file_path.as_ref().display()
                )
            })?;


        // Parse the string into the `UnresolvedConfiguration` structure and then resolve it.
        let unresolved_configuration =
            toml::from_str::<UnresolvedConfiguration>(&configuration_string)
                .into_diagnostic()
                .wrap_err("Could not load configuration file!")?;


        let configuration_file_path = dunce::canonicalize(configuration_file_path)
            .into_diagnostic()
            .wrap_err("Could not canonicalize configuration file path!")?;

        let resolved_configuration = unresolved_configuration
            .resolve(Some(configuration_file_path))
            .wrap_err("Failed to resolve configuration.")?;

        Ok(resolved_configuration)
    }

    /// Load the configuration from the default path (`./data/configuration.toml`),
    /// falling back to the built-in defaults if there is no file there.
    pub fn load_from_default_path() -> Result<Configuration> {
        let default_path = get_default_configuration_file_path()
            .wrap_err_with(|| "Could not determine the default configuration file path.")?;

        if default_path.is_file() {
            return Configuration::load_from_path(default_path);
        }

        debug!("No configuration file at the default path, using defaults.");
        Configuration::default_configuration()
    }

    /// The built-in defaults.
    pub fn default_configuration() -> Result<Configuration> {
        UnresolvedConfiguration::default()
            .resolve(None)
            .wrap_err("Failed to resolve default configuration.")
    }
}
