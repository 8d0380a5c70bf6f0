//! ACSets CLI
//!
//! - Print the MiraNet schema (text dialect or JSON)
//! - Validate schema text files
//! - Build the SIR demo net and inspect it

use std::fs;
use std::path::{Path, PathBuf};

use acsets_core::{AcsetConfig, DeletionPolicy};
use acsets_petri::{mira_schema, MiraNet};
use acsets_schema::{format_schema_text, parse_schema_text, Schema};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod demo;

#[derive(Parser)]
#[command(name = "acsets")]
#[command(author, version, about = "ACSets: schema-typed in-memory data with MiraNet Petri nets")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the MiraNet schema.
    Schema {
        #[arg(long, value_enum, default_value_t = SchemaFormat::Text)]
        format: SchemaFormat,
    },

    /// Parse a schema text file and print a summary.
    Check {
        /// Schema text file
        input: PathBuf,
        /// Print the parsed schema as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Build the SIR demo net and print it.
    Demo {
        /// What removing a still-referenced part does
        #[arg(long, default_value = "cascade")]
        policy: DeletionPolicy,
        /// Remove the named species before printing
        #[arg(long, value_name = "SPECIES")]
        remove: Option<String>,
        /// Print the instance snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SchemaFormat {
    Text,
    Json,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Schema { format } => cmd_schema(format),
        Commands::Check { input, json } => cmd_check(&input, json),
        Commands::Demo {
            policy,
            remove,
            json,
        } => cmd_demo(policy, remove.as_deref(), json),
    }
}

fn cmd_schema(format: SchemaFormat) -> Result<()> {
    let schema = mira_schema()?;
    match format {
        SchemaFormat::Text => print!("{}", format_schema_text(&schema)),
        SchemaFormat::Json => println!("{}", serde_json::to_string_pretty(&schema)?),
    }
    Ok(())
}

fn cmd_check(input: &Path, json: bool) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let schema =
        parse_schema_text(&text).with_context(|| format!("invalid schema in {}", input.display()))?;
    tracing::info!(path = %input.display(), schema = schema.name(), "parsed schema");

    if json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    println!("{} {}", "Checking".green().bold(), input.display());
    print_schema_summary(&schema);
    println!("{}", "Valid.".green());
    Ok(())
}

fn print_schema_summary(schema: &Schema) {
    println!("  Schema: {}", schema.name().cyan());
    println!("  Objects: {}", schema.obs().len());
    println!("  Homs: {}", schema.homs().len());
    println!("  Attribute types: {}", schema.attrtypes().len());
    println!("  Attributes: {}", schema.attrs().len());

    for ob in schema.ob_refs() {
        let Some(decl) = schema.ob(ob) else { continue };
        let homs: Vec<String> = schema
            .homs_out_of(ob)
            .filter_map(|h| schema.hom(h))
            .map(|h| format!("{} -> {}", h.name, h.codom))
            .collect();
        let attrs: Vec<String> = schema
            .attrs_of(ob)
            .filter_map(|a| schema.attr(a))
            .map(|a| format!("{}: {}", a.name, a.codom))
            .collect();
        println!(
            "    {}{}: {} homs, {} attrs",
            decl.name.yellow(),
            decl.title
                .as_deref()
                .map(|t| format!(" ({t})"))
                .unwrap_or_default(),
            homs.len(),
            attrs.len()
        );
        for line in homs.iter().chain(attrs.iter()) {
            println!("      {line}");
        }
    }
}

fn cmd_demo(policy: DeletionPolicy, remove: Option<&str>, json: bool) -> Result<()> {
    let config = AcsetConfig::default().with_deletion(policy);
    let mut net = MiraNet::sir_demo_with_config(config)?;

    if let Some(name) = remove {
        let species = net
            .species_by_name(name)?
            .ok_or_else(|| anyhow!("no species named `{name}` in the demo net"))?;
        net.remove_species(species)
            .with_context(|| format!("cannot remove species `{name}` (policy: {policy})"))?;
        if !json {
            println!("{} species {}", "removed".yellow().bold(), name.bold());
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&net.acset().snapshot())?);
    } else {
        demo::print_net(&net, policy)?;
    }
    Ok(())
}
