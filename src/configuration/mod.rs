//! Settings of the `confreg` binary: log filters, an optional log directory,
//! and the registry defaults (macro precedence and key delimiters) used when
//! the command line does not override them. The documents the tool inspects
//! are configured nowhere here.
//!
//! Start with [`Configuration::load_from_default_path`], which reads
//! `./data/configuration.toml` and falls back to built-in defaults.
//!
//! # Loading in two steps
//! The TOML file is first deserialized as plain strings and lists into
//! [`UnresolvedConfiguration`]. Resolving it parses those into real types
//! ([`confreg::MacroPrecedence`], [`confreg::KeyDelimiters`], log filters),
//! makes the log directory absolute relative to the file, and yields a
//! [`Configuration`]. A bad filter or precedence list is reported while the
//! tool starts, before any document is opened.

#![allow(rustdoc::private_intra_doc_links)]

mod structure;
mod traits;
mod utilities;

pub use structure::*;
