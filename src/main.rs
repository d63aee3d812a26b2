use std::path::Path;

use clap::Parser;
use confreg::{document::render_document, DocumentFormat, KeyPath, Registry, Value};
use miette::{miette, Context, Result};
use tracing::info;

use crate::{
    cli::{CLIArgs, CLICommand, OutputKind},
    configuration::Configuration,
    logging::initialize_tracing,
};

mod cli;
mod configuration;
mod logging;


fn load_registry(
    template: &Registry,
    document: &Path,
    subkey: Option<String>,
) -> Result<Registry> {
    let mut registry = template.clone();

    registry
        .load(document, subkey.map(KeyPath::from))
        .wrap_err_with(|| miette!("Failed to load document {}.", document.display()))?;

    Ok(registry)
}

fn run_get(
    template: &Registry,
    document: &Path,
    key: String,
    subkey: Option<String>,
    output_kind: OutputKind,
) -> Result<()> {
    let registry = load_registry(template, document, subkey)?;
    let lookup_failed = || miette!("Failed to look up key {}.", key);

    match output_kind {
        OutputKind::String => {
            println!("{}", registry.as_string(&key).wrap_err_with(lookup_failed)?);
        }
        OutputKind::Integer => {
            println!("{}", registry.as_integer(&key).wrap_err_with(lookup_failed)?);
        }
        OutputKind::Float => {
            println!("{}", Value::Float(registry.as_float(&key).wrap_err_with(lookup_failed)?));
        }
        OutputKind::Path => {
            println!(
                "{}",
                registry.as_pathname(&key).wrap_err_with(lookup_failed)?.display()
            );
        }
        OutputKind::Sequence => {
            for element in registry.as_sequence(&key).wrap_err_with(lookup_failed)? {
                println!("{element}");
            }
        }
    }

    Ok(())
}

fn run_check(template: &Registry, document: &Path) -> Result<()> {
    let registry = load_registry(template, document, None)?;

    let summary = match registry.values() {
        Some(Value::Mapping(mapping)) => format!(
            "{} top-level keys: {}",
            mapping.len(),
            mapping
                .keys()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Some(Value::Sequence(values)) => format!("a sequence of {} entries", values.len()),
        Some(other) => format!("a single {} value", other.kind_name()),
        None => "no values".to_string(),
    };

    let checked_path = registry.file_path().unwrap_or(document);
    println!("{} is valid: {}.", checked_path.display(), summary);

    Ok(())
}

fn run_dump(
    template: &Registry,
    document: &Path,
    subkey: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let mut registry = load_registry(template, document, subkey)?;

    if let Some(output) = output {
        registry
            .save(output, None, true)
            .wrap_err_with(|| miette!("Failed to save document to {}.", output.display()))?;

        info!("Saved document to {}.", output.display());
        return Ok(());
    }

    let Some(values) = registry.values() else {
        return Ok(());
    };

    let text = render_document(values, DocumentFormat::Yaml)
        .map_err(|reason| miette!("Failed to render document: {}", reason))?;
    print!("{text}");

    Ok(())
}


fn main() -> Result<()> {
    let cli_args = CLIArgs::parse();

    // Load configuration.
    let configuration = match cli_args.configuration_file_path.as_ref() {
        Some(path) => Configuration::load_from_path(path),
        None => Configuration::load_from_default_path(),
    }
    .wrap_err("Failed to load configuration file.")?;


    let logging_raii_guard = initialize_tracing(
        configuration.logging.console_output_level_filter(),
        configuration.logging.log_file_output_level_filter(),
        configuration.logging.log_file_output_directory.as_deref(),
        "confreg.log",
    )
    .wrap_err("Failed to initialize tracing.")?;

    info!("Tracing initialized.");

    match configuration.file_path.as_ref() {
        Some(path) => info!("Configuration loaded: {}.", path.display()),
        None => info!("Configuration file not found, using defaults."),
    }


    // Command-line settings take precedence over the configuration file.
    let macro_precedence = cli_args
        .macro_precedence
        .unwrap_or(configuration.registry.macro_precedence);
    let key_delimiters = cli_args
        .key_delimiters
        .unwrap_or(configuration.registry.key_delimiters);

    let template = Registry::new()
        .with_macro_precedence(macro_precedence)
        .with_key_delimiters(key_delimiters);


    match cli_args.command {
        CLICommand::Get {
            document,
            key,
            subkey,
            output_kind,
        } => run_get(&template, &document, key, subkey, output_kind)?,
        CLICommand::Check { document } => run_check(&template, &document)?,
        CLICommand::Dump {
            document,
            subkey,
            output,
        } => run_dump(&template, &document, subkey, output.as_deref())?,
    }


    drop(logging_raii_guard);
    Ok(())
}
