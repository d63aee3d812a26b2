//! Finding the file a configuration document lives in.

use std::path::{Component, Path, PathBuf};

use crate::error::{RegistryError, Result};


/// The directory family a [`LocatorInfo`] points into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// The per-user data directory, `<data dir>/<package>`.
    User,
    /// An installation prefix, `<prefix>/share/<group>/<package>`.
    Prefix(PathBuf),
}

/// Identifies a document by the package that owns it instead of by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorInfo {
    pub package_name: String,
    pub group_name: String,
    pub file_name: String,
    pub location: Location,
}

impl LocatorInfo {
    pub fn base_directory(&self) -> Result<PathBuf> {
        match &self.location {
            Location::User => dirs::data_dir()
                .map(|data_directory| data_directory.join(&self.package_name))
                .ok_or_else(|| {
                    RegistryError::configuration("could not determine the user data directory")
                }),
            Location::Prefix(prefix) => Ok(prefix
                .join("share")
                .join(&self.group_name)
                .join(&self.package_name)),
        }
    }
}


/// Either a plain path or a package-relative locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocator {
    Path(PathBuf),
    Info(LocatorInfo),
}

impl DocumentLocator {
    /// The lexically normalized file path of the document.
    pub fn to_path(&self) -> Result<PathBuf> {
        let path = match self {
            DocumentLocator::Path(path) => path.clone(),
            DocumentLocator::Info(info) => info.base_directory()?.join(&info.file_name),
        };

        Ok(normalize_path(&path))
    }
}

impl From<&Path> for DocumentLocator {
    fn from(path: &Path) -> Self {
        DocumentLocator::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for DocumentLocator {
    fn from(path: PathBuf) -> Self {
        DocumentLocator::Path(path)
    }
}

impl From<&PathBuf> for DocumentLocator {
    fn from(path: &PathBuf) -> Self {
        DocumentLocator::Path(path.clone())
    }
}

impl From<&str> for DocumentLocator {
    fn from(path: &str) -> Self {
        DocumentLocator::Path(PathBuf::from(path))
    }
}

impl From<String> for DocumentLocator {
    fn from(path: String) -> Self {
        DocumentLocator::Path(PathBuf::from(path))
    }
}

impl From<LocatorInfo> for DocumentLocator {
    fn from(info: LocatorInfo) -> Self {
        DocumentLocator::Info(info)
    }
}


/// Normalizes a path without touching the filesystem.
///
/// `.` components are dropped and `..` removes the preceding normal component.
/// Leading `..` components of relative paths are kept, and `..` directly after
/// the root is discarded. An empty result is `.`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            other => components.push(other),
        }
    }

    if components.is_empty() {
        return PathBuf::from(".");
    }

    components.iter().collect()
}
