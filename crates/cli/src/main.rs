mod settings;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stackcfg_core::{ErrorList, ParsedConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Load, merge and validate directory-scoped configuration.
#[derive(Parser)]
#[command(name = "stackcfg", version, about = "Directory-scoped configuration loader")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a directory and print the merged configuration as JSON
    Parse(ScopeArgs),

    /// Parse a directory and report only whether it is valid
    Check(ScopeArgs),
}

#[derive(Args)]
struct ScopeArgs {
    /// Directory to load
    dir: PathBuf,
    /// Project root; imports may not leave it (defaults to the directory)
    #[arg(long)]
    root: Option<PathBuf>,
    /// Enable an experiment (repeatable)
    #[arg(long = "experiment", value_name = "NAME")]
    experiments: Vec<String>,
    /// Settings file (defaults to <root>/stackcfg.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Parse(args) => cmd_parse(args, cli.output, cli.quiet),
        Commands::Check(args) => cmd_check(args, cli.output, cli.quiet),
    }
}

fn cmd_parse(args: &ScopeArgs, output: OutputFormat, quiet: bool) {
    let (_, config) = load(args, output, quiet);
    let pretty = serde_json::to_string_pretty(&config)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

fn cmd_check(args: &ScopeArgs, output: OutputFormat, quiet: bool) {
    let (dir, config) = load(args, output, quiet);
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => println!("{}: ok ({})", dir.display(), summary(&config)),
        OutputFormat::Json => {
            let result = serde_json::json!({
                "dir": dir,
                "status": "ok",
                "globals": config.globals.len(),
                "scripts": config.scripts.len(),
                "stack": config.stack.is_some(),
                "inputs": config.inputs.len(),
                "outputs": config.outputs.len(),
                "asserts": config.asserts.len(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&result).unwrap_or_default()
            );
        }
    }
}

fn summary(config: &ParsedConfig) -> String {
    let mut parts = vec![
        format!("{} globals", config.globals.len()),
        format!("{} scripts", config.scripts.len()),
    ];
    if config.stack.is_some() {
        parts.push("stack".to_string());
    }
    if !config.asserts.is_empty() {
        parts.push(format!("{} asserts", config.asserts.len()));
    }
    parts.join(", ")
}

/// Resolve paths and settings, then parse. Exits the process on failure.
fn load(args: &ScopeArgs, output: OutputFormat, quiet: bool) -> (PathBuf, ParsedConfig) {
    let prepared = settings::canonical(&args.dir).and_then(|dir| {
        let root = match &args.root {
            Some(root) => settings::canonical(root)?,
            None => dir.clone(),
        };
        let options =
            settings::load_options(&root, args.config.as_deref(), &args.experiments)?;
        Ok((dir, root, options))
    });
    let (dir, root, options) = match prepared {
        Ok(p) => p,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    match stackcfg_core::parse_dir(&root, &dir, &options) {
        Ok(config) => (dir, config),
        Err(errors) => {
            report_errors(&dir, &errors, output, quiet);
            process::exit(1);
        }
    }
}

fn report_errors(dir: &Path, errors: &ErrorList, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(errors)
                .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", errors));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => {
            if quiet {
                return;
            }
            for e in errors.iter() {
                eprintln!("{}", e);
            }
            eprintln!("{}: {} error(s)", dir.display(), errors.len());
        }
    }
}

fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
