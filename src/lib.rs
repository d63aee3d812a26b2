//! A hierarchical configuration registry with macro expansion.
//!
//! Documents (YAML or TOML) are loaded into a generic tree of mappings,
//! sequences and scalars. Values are looked up with delimited key paths such
//! as `vis/psfdata/2020-10-20/350.0/0`, where each segment is interpreted
//! according to the type of the keys at its level.
//!
//! String values may contain `$( key )$` macros. A macro is replaced by the
//! value of another key in the document or by an environment variable, in the
//! order given by the registry's [`MacroPrecedence`].
//!
//! Your starting point should probably be [`Registry::open`].
//!
//! ```no_run
//! use confreg::Registry;
//!
//! # fn main() -> confreg::Result<()> {
//! let registry = Registry::open("configuration.yaml")?;
//! let data_file = registry.as_pathname("vis/spatial_psf/data_file")?;
//! let vis = registry.subkey("vis")?;
//! let native_size = vis.as_float_array("window/native_size")?;
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod locator;
pub mod macros;
pub mod path;
pub mod registry;
pub mod validate;
pub mod value;

pub use document::DocumentFormat;
pub use error::{KeyTypeViolation, RegistryError, Result};
pub use locator::{DocumentLocator, Location, LocatorInfo};
pub use macros::{Environment, MacroPrecedence, MacroSource, MapEnvironment, ProcessEnvironment};
pub use path::{KeyDelimiters, KeyPath};
pub use registry::Registry;
pub use value::{Key, KeyKind, Mapping, Value};
