use miette::Result;

/// A deserialized configuration table that still has to be checked and
/// converted before use.
pub trait ResolvableConfiguration {
    type Resolved;

    /// Checks the raw values and converts them into the resolved table.
    fn resolve(self) -> Result<Self::Resolved>;
}


/// Like [`ResolvableConfiguration`], for tables that need outside information
/// to resolve, such as the directory of the configuration file.
pub trait ResolvableConfigurationWithContext {
    type Context;
    type Resolved;

    /// Checks the raw values against `context` and converts them.
    fn resolve(self, context: Self::Context) -> Result<Self::Resolved>;
}
