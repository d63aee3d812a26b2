use confreg::{KeyDelimiters, MacroPrecedence};
use miette::{Context, Result};
use serde::Deserialize;

use crate::configuration::traits::ResolvableConfiguration;


fn default_macro_precedence() -> Vec<String> {
    vec!["env".to_string(), "int".to_string()]
}

fn default_key_delimiters() -> Vec<String> {
    vec!["/".to_string()]
}


#[derive(Deserialize, Clone, Debug)]
pub(super) struct UnresolvedRegistryConfiguration {
    #[serde(default = "default_macro_precedence")]
    macro_precedence: Vec<String>,

    #[serde(default = "default_key_delimiters")]
    key_delimiters: Vec<String>,
}

impl Default for UnresolvedRegistryConfiguration {
    fn default() -> Self {
        Self {
            macro_precedence: default_macro_precedence(),
            key_delimiters: default_key_delimiters(),
        }
    }
}

/// Registry settings used unless overridden on the command line.
#[derive(Clone, Debug)]
pub struct RegistryConfiguration {
    pub macro_precedence: MacroPrecedence,

    pub key_delimiters: KeyDelimiters,
}

impl ResolvableConfiguration for UnresolvedRegistryConfiguration {
    type Resolved = RegistryConfiguration;

    fn resolve(self) -> Result<Self::Resolved> {
        let macro_precedence = MacroPrecedence::from_strings(&self.macro_precedence)
            .wrap_err("Failed to parse field macro_precedence")?;

        let key_delimiters = KeyDelimiters::from_strings(&self.key_delimiters)
            .wrap_err("Failed to parse field key_delimiters")?;


        Ok(RegistryConfiguration {
            macro_precedence,
            key_delimiters,
        })
    }
}
