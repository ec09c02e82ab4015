//! bugsight - AI-assisted debugging from the command line
//!
//! ## Commands
//!
//! - `models`: List the models bugsight can dispatch to
//! - `prompt`: Print the prompt that would be sent for a code sample
//! - `diagnose`: Ask one model to diagnose a code sample

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use bugsight_core::{catalog, prompt};
use bugsight_runtime::{
    ApiCredential, CredentialSource, DiagnosticRequest, DispatchOutcome, DispatchReport,
    Dispatcher, RuntimeConfig,
};

#[derive(Parser)]
#[command(name = "bugsight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Diagnose code problems with a language model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available models grouped by provider
    Models {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the rendered prompt without calling a provider
    Prompt {
        /// File containing the code, or "-" for stdin
        #[arg(short, long)]
        code: PathBuf,

        /// Description of the problem
        #[arg(short, long)]
        problem: String,
    },

    /// Diagnose a code sample with one model
    Diagnose {
        /// Model identifier (see `bugsight models`)
        #[arg(short, long)]
        model: String,

        /// File containing the code, or "-" for stdin
        #[arg(short, long)]
        code: PathBuf,

        /// Description of the problem
        #[arg(short, long)]
        problem: String,

        /// API key (defaults to the provider's environment variable)
        #[arg(long)]
        api_key: Option<String>,

        /// Runtime configuration file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the request timeout, e.g. "30s"
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,

        /// Print the full dispatch report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Models { json } => cmd_models(json),
        Commands::Prompt { code, problem } => cmd_prompt(&code, &problem),
        Commands::Diagnose {
            model,
            code,
            problem,
            api_key,
            config,
            timeout,
            json,
        } => {
            let report = cmd_diagnose(
                model,
                &code,
                problem,
                api_key,
                config.as_deref(),
                timeout,
            )
            .await?;

            print_report(&report, json)?;
            if !report.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn cmd_models(json: bool) -> Result<()> {
    let grouped = catalog::grouped_by_provider();

    if json {
        println!("{}", serde_json::to_string_pretty(&grouped)?);
        return Ok(());
    }

    for (provider, models) in grouped {
        println!("{}", provider.display_name());
        for model in models {
            println!("  {:<40} {}", model.identifier, model.display_label);
        }
    }
    Ok(())
}

fn cmd_prompt(code: &Path, problem: &str) -> Result<()> {
    let code_text = read_code(code)?;
    println!("{}", prompt::build(&code_text, problem));
    Ok(())
}

async fn cmd_diagnose(
    model: String,
    code: &Path,
    problem: String,
    api_key: Option<String>,
    config_path: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<DispatchReport> {
    let code_text = read_code(code)?;
    if code_text.trim().is_empty() {
        bail!("Code sample is empty");
    }
    if problem.trim().is_empty() {
        bail!("Problem description is empty");
    }

    let mut config = match config_path {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(timeout) = timeout {
        config.request_timeout = timeout;
        config.validate().context("Invalid --timeout")?;
    }

    let credential = match (api_key, catalog::lookup(&model)) {
        (Some(key), _) => ApiCredential::new(key, CredentialSource::Programmatic, "API key"),
        (None, Some(descriptor)) => ApiCredential::for_provider_from_env(descriptor.provider)?,
        // The dispatcher reports the unknown model before any call is made
        (None, None) => ApiCredential::new("", CredentialSource::Programmatic, "API key"),
    };

    let dispatcher =
        Dispatcher::from_config(&config).context("Failed to initialize provider adapters")?;
    let request = DiagnosticRequest::new(code_text, problem, model, credential);

    Ok(dispatcher.run(request).await)
}

fn print_report(report: &DispatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match &report.outcome {
        DispatchOutcome::Succeeded { result } => {
            println!("Problem\n{}\n", result.problem_analysis());
            println!("Solution\n{}\n", result.solution_steps());
            println!("Code\n{}", result.code_snippet());
        }
        DispatchOutcome::Failed {
            kind,
            stage,
            message,
        } => {
            eprintln!("error: {}", message);
            eprintln!("  kind: {}, stage: {}", kind, stage);
        }
    }
    Ok(())
}

fn read_code(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read code from stdin")?;
        return Ok(text);
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
