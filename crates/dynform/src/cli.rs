use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use dynform_client::RemoteDataCache;
use dynform_spec::{
    ErrorCode, FieldError, FieldSpec, FormValues, ValidationContract, check_field_list,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, BASE_URL_ENV};
use crate::session::{ChoiceError, FormSession};

#[derive(Parser, Debug)]
#[command(
    name = "dynform",
    about = "Fill and submit forms described by a remote service",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration file (defaults to ./dynform.toml when present)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Base URL of the form service
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the field list and show each field's resolved kind
    Fields(FieldsArgs),
    /// Fetch the options of a choice field
    Choices(ChoicesArgs),
    /// Validate answers and submit them to the service
    Submit(SubmitArgs),
    /// Validate answers against a field list file without contacting the service
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct FieldsArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ChoicesArgs {
    /// Field id
    field_id: String,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    /// JSON object mapping field ids to raw values
    #[arg(long, value_name = "FILE")]
    answers: PathBuf,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// JSON array of {id, label, widget} objects
    #[arg(long, value_name = "FILE")]
    fields: PathBuf,
    /// JSON object mapping field ids to raw values
    #[arg(long, value_name = "FILE")]
    answers: PathBuf,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(std::env::var(BASE_URL_ENV).ok(), cli.base_url.clone());

    match cli.command {
        Commands::Fields(args) => fields(&config, args).await,
        Commands::Choices(args) => choices(&config, args).await,
        Commands::Submit(args) => submit(&config, args).await,
        Commands::Check(args) => check(&config, args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_session(config: &AppConfig) -> Result<FormSession> {
    let cache = RemoteDataCache::http(config.client.clone())
        .with_context(|| format!("invalid base url '{}'", config.client.base_url))?;
    Ok(FormSession::new(cache, config.resolver()?))
}

async fn fields(config: &AppConfig, args: FieldsArgs) -> Result<()> {
    let session = open_session(config)?;
    let form = session.load().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(form.fields())?);
        return Ok(());
    }
    for field in form.fields() {
        let marker = if field.overridden { " (overridden)" } else { "" };
        println!(
            "{}\t{}\t{} -> {}{}",
            field.id(),
            field.label(),
            field.spec.declared_kind,
            field.resolved_kind,
            marker
        );
    }
    Ok(())
}

async fn choices(config: &AppConfig, args: ChoicesArgs) -> Result<()> {
    let session = open_session(config)?;
    session.load().await?;
    match session.load_choices(&args.field_id).await {
        Ok(options) => {
            for option in options.iter() {
                println!("{option}");
            }
            Ok(())
        }
        Err(err @ ChoiceError::NotChoice { .. }) => bail!("{err}; nothing to fetch"),
        Err(err) => Err(err.into()),
    }
}

async fn submit(config: &AppConfig, args: SubmitArgs) -> Result<()> {
    let values = read_answers(&args.answers)?;
    let session = open_session(config)?;
    session.load().await?;
    session.load_all_choices().await;
    let coordinator = session
        .coordinator()
        .context("form is not loaded")?;
    let errors = coordinator.set_values(&values);
    for error in &errors {
        eprintln!("{}: {}", error.field_id, error.message);
    }
    reject_unknown_fields(&errors)?;

    match coordinator.submit().await {
        Ok(outcome) if outcome.is_success() => {
            println!("{}", outcome.message);
            Ok(())
        }
        Ok(outcome) => bail!("{}", outcome.message),
        Err(err) => Err(err.into()),
    }
}

fn check(config: &AppConfig, args: CheckArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.fields)
        .with_context(|| format!("failed to read {}", args.fields.display()))?;
    let fields: Vec<FieldSpec> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.fields.display()))?;
    check_field_list(&fields)?;
    let values = read_answers(&args.answers)?;

    let resolved = config.resolver()?.resolve_all(&fields);
    let report = ValidationContract::compile(&resolved).evaluate(&values);
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.valid {
        bail!("answers failed validation");
    }
    Ok(())
}

/// Answers for ids outside the form are never stored, so they fail the command here.
fn reject_unknown_fields(errors: &[FieldError]) -> Result<()> {
    let unknown: Vec<&str> = errors
        .iter()
        .filter(|error| error.code == ErrorCode::UnknownField)
        .map(|error| error.field_id.as_str())
        .collect();
    if !unknown.is_empty() {
        bail!("answers name fields this form does not have: {}", unknown.join(", "));
    }
    Ok(())
}

fn read_answers(path: &Path) -> Result<FormValues> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    answers_from_json(value)
}

/// Raw values from a JSON object; scalars are taken as the text a user would type.
fn answers_from_json(value: Value) -> Result<FormValues> {
    let Value::Object(map) = value else {
        bail!("answers must be a JSON object");
    };
    let mut values = FormValues::new();
    for (field_id, value) in map {
        let raw = match value {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            other => bail!("answer for '{field_id}' must be a scalar, got {other}"),
        };
        values.set(field_id, raw);
    }
    Ok(values)
}
