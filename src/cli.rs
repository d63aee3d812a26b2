//! Command-line interface definitions for the `confreg` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use confreg::{KeyDelimiters, MacroPrecedence};



/// Command-line arguments.
#[derive(Parser)]
#[command(
    name = "confreg",
    author,
    about = "Look up values in macro-expanding YAML and TOML configuration documents.",
    version
)]
pub struct CLIArgs {
    /// This is the path to the configuration file of the tool itself.
    /// If unspecified, this defaults to `./data/configuration.toml` (if it exists).
    #[arg(
        short = 'c',
        long = "configuration-file-path",
        help = "Path to the configuration file to use. Defaults to ./data/configuration.toml"
    )]
    pub configuration_file_path: Option<PathBuf>,

    #[arg(
        long = "precedence",
        help = "Macro lookup order, a comma-separated list of \"env\" and \"int\". \
                Overrides the configuration file."
    )]
    pub macro_precedence: Option<MacroPrecedence>,

    #[arg(
        long = "delimiters",
        help = "Key path delimiters, one character each; the last one is canonical. \
                Overrides the configuration file."
    )]
    pub key_delimiters: Option<KeyDelimiters>,

    #[command(subcommand)]
    pub command: CLICommand,
}


#[derive(Subcommand)]
pub enum CLICommand {
    /// Print the value of a single key.
    Get {
        #[arg(help = "Document to read.")]
        document: PathBuf,

        #[arg(help = "Key path to look up, e.g. \"nir/window/native_size\".")]
        key: String,

        #[arg(long = "subkey", help = "Narrow the document to this subkey before the lookup.")]
        subkey: Option<String>,

        #[arg(
            long = "as",
            value_enum,
            default_value_t = OutputKind::String,
            help = "How to convert the value before printing it."
        )]
        output_kind: OutputKind,
    },

    /// Load and validate a document.
    Check {
        #[arg(help = "Document to validate.")]
        document: PathBuf,
    },

    /// Print (or save) a document, optionally narrowed to a subkey.
    Dump {
        #[arg(help = "Document to read.")]
        document: PathBuf,

        #[arg(long = "subkey", help = "Only dump this subkey.")]
        subkey: Option<String>,

        #[arg(
            short = 'o',
            long = "output",
            help = "Save to this file (YAML, or TOML for *.toml) instead of printing."
        )]
        output: Option<PathBuf>,
    },
}


#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    String,
    Integer,
    Float,
    Path,
    Sequence,
}
