use std::{
    env::current_dir,
    path::{Path, PathBuf},
};

use miette::{miette, Context, IntoDiagnostic, Result};


/// Returns the default configuration filepath, which is at
/// `{current directory}/data/configuration.toml`.
///
/// The file does not have to exist.
pub fn get_default_configuration_file_path() -> Result<PathBuf> {
    let mut configuration_filepath = current_dir()
        .into_diagnostic()
        .wrap_err_with(|| miette!("Could not get the current directory."))?;
    configuration_filepath.push("data/configuration.toml");

    Ok(configuration_filepath)
}

/// Joins relative paths onto `base_directory`, leaving absolute paths alone.
#[must_use = "function returns the resolved path"]
pub fn resolve_relative_to<S>(path: S, base_directory: Option<&Path>) -> PathBuf
where
    S: Into<String>,
{
    let path = PathBuf::from(path.into());

    match base_directory {
        Some(base_directory) if path.is_relative() => base_directory.join(path),
        _ => path,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_are_joined_to_the_base() {
        assert_eq!(
            resolve_relative_to("logs", Some(Path::new("/etc/confreg"))),
            PathBuf::from("/etc/confreg/logs")
        );
        assert_eq!(
            resolve_relative_to("/var/log", Some(Path::new("/etc/confreg"))),
            PathBuf::from("/var/log")
        );
        assert_eq!(resolve_relative_to("logs", None), PathBuf::from("logs"));
    }
}
