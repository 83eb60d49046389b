// crates/transformer-config-cli/src/main.rs
// ============================================================================
// Module: Transformer Config CLI Entry Point
// Description: Command dispatcher for transformer config validation and artifacts.
// Purpose: Validate, resolve, and document transformer.toml from the shell.
// Dependencies: clap, serde_json, thiserror, toml, tracing, tracing-subscriber,
//               transformer-config
// ============================================================================

//! ## Overview
//! The transformer-config CLI validates training configs before launch, prints
//! the fully resolved config, and regenerates the schema, example, and docs
//! artifacts. Diagnostics go to stderr through `tracing`; the filter is read
//! from `TRANSFORMER_CONFIG_LOG` and defaults to `warn`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use transformer_config::DOCS_PATH;
use transformer_config::TransformerConfig;
use transformer_config::config_schema;
use transformer_config::config_toml_example;
use transformer_config::verify_config_docs;
use transformer_config::write_config_docs;
use transformer_config_cli::t;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the `tracing` filter directive.
const LOG_ENV: &str = "TRANSFORMER_CONFIG_LOG";
/// Filter used when `TRANSFORMER_CONFIG_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "transformer-config",
    disable_help_subcommand = true,
    disable_version_flag = true
)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Configuration docs utilities.
    Docs {
        /// Selected docs subcommand.
        #[command(subcommand)]
        command: DocsCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a transformer configuration file and print a summary.
    Validate(ConfigPathArgs),
    /// Print the configuration with every default resolved.
    Resolve(ConfigResolveCommand),
    /// Print the JSON schema for transformer.toml.
    Schema,
    /// Print a canonical example transformer.toml.
    Example,
}

/// Docs subcommands.
#[derive(Subcommand, Debug)]
enum DocsCommand {
    /// Regenerate the configuration reference.
    Write(DocsPathArgs),
    /// Fail if the configuration reference is out of date.
    Verify(DocsPathArgs),
}

/// Arguments locating a config file.
#[derive(Args, Debug)]
struct ConfigPathArgs {
    /// Optional config file path (defaults to transformer.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for config resolution.
#[derive(Args, Debug)]
struct ConfigResolveCommand {
    /// Config file location.
    #[command(flatten)]
    path: ConfigPathArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = ResolveFormat::Toml)]
    format: ResolveFormat,
}

/// Output formats for resolved configs.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum ResolveFormat {
    /// TOML, matching the input format.
    Toml,
    /// Pretty-printed JSON.
    Json,
}

/// Arguments locating the docs file.
#[derive(Args, Debug)]
struct DocsPathArgs {
    /// Docs output path (defaults to Docs/configuration/transformer.toml.md).
    #[arg(long, value_name = "PATH")]
    path: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a catalog message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing()?;

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Docs {
            command,
        } => command_docs(command),
    }
}

/// Installs the stderr `tracing` subscriber.
fn init_tracing() -> CliResult<()> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) => EnvFilter::try_new(&directives)
            .map_err(|err| CliError::new(t!("logging.filter_invalid", env = LOG_ENV, error = err)))?,
        Err(_) => EnvFilter::new(DEFAULT_LOG_FILTER),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    Ok(())
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
        ConfigCommand::Resolve(command) => command_config_resolve(&command),
        ConfigCommand::Schema => command_config_schema(),
        ConfigCommand::Example => command_config_example(),
    }
}

/// Loads and validates the config named by `args`.
fn load_config(args: &ConfigPathArgs) -> CliResult<TransformerConfig> {
    TransformerConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigPathArgs) -> CliResult<ExitCode> {
    let config = load_config(command)?;
    for line in summary_lines(&config) {
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    write_stdout_line(&t!("config.validate.ok"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Builds the human-readable summary of a validated config.
fn summary_lines(config: &TransformerConfig) -> Vec<String> {
    let parallel = &config.parallel;
    let vpp = parallel
        .virtual_pipeline_model_parallel_size
        .map_or_else(|| t!("value.none"), |stages| stages.to_string());
    let moe = match (config.moe.num_experts, config.num_local_experts()) {
        (Some(experts), Some(local)) => t!(
            "config.validate.summary.moe",
            experts = experts,
            local = local,
            topk = config.moe.router_topk
        ),
        _ => t!("config.validate.summary.dense"),
    };
    vec![
        t!(
            "config.validate.summary.model",
            layers = config.model.num_layers,
            hidden = config.model.hidden_size,
            ffn = config.ffn_hidden_size(),
            heads = config.model.num_attention_heads,
            groups = config.num_query_groups(),
            kv = config.kv_channels()
        ),
        t!(
            "config.validate.summary.layout",
            tp = parallel.tensor_model_parallel_size,
            pp = parallel.pipeline_model_parallel_size,
            vpp = vpp,
            ep = parallel.expert_model_parallel_size,
            sp = parallel.sequence_parallel
        ),
        t!(
            "config.validate.summary.precision",
            compute = config.compute_dtype(),
            params = config.precision.params_dtype
        ),
        moe,
    ]
}

/// Executes the config resolve command.
fn command_config_resolve(command: &ConfigResolveCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.path)?;
    let rendered = match command.format {
        ResolveFormat::Toml => toml::to_string_pretty(&config).map_err(|err| {
            CliError::new(t!("config.render_failed", format = "toml", error = err))
        })?,
        ResolveFormat::Json => serde_json::to_string_pretty(&config).map_err(|err| {
            CliError::new(t!("config.render_failed", format = "json", error = err))
        })?,
    };
    debug!(bytes = rendered.len(), "rendered resolved config");
    write_stdout_text(&rendered)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config schema command.
fn command_config_schema() -> CliResult<ExitCode> {
    let rendered = serde_json::to_string_pretty(&config_schema())
        .map_err(|err| CliError::new(t!("config.render_failed", format = "json", error = err)))?;
    write_stdout_text(&rendered)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config example command.
fn command_config_example() -> CliResult<ExitCode> {
    write_stdout_text(&config_toml_example())?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Docs Commands
// ============================================================================

/// Dispatches docs subcommands.
fn command_docs(command: DocsCommand) -> CliResult<ExitCode> {
    match command {
        DocsCommand::Write(args) => command_docs_write(&args),
        DocsCommand::Verify(args) => command_docs_verify(&args),
    }
}

/// Executes the docs write command.
fn command_docs_write(args: &DocsPathArgs) -> CliResult<ExitCode> {
    write_config_docs(args.path.as_deref())
        .map_err(|err| CliError::new(t!("docs.write_failed", error = err)))?;
    let path = args
        .path
        .as_ref()
        .map_or_else(|| DOCS_PATH.to_string(), |path| path.display().to_string());
    write_stdout_line(&t!("docs.write.ok", path = path))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the docs verify command.
fn command_docs_verify(args: &DocsPathArgs) -> CliResult<ExitCode> {
    verify_config_docs(args.path.as_deref())
        .map_err(|err| CliError::new(t!("docs.verify_failed", error = err)))?;
    write_stdout_line(&t!("docs.verify.ok"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes text to stdout, adding a trailing newline when missing.
fn write_stdout_text(text: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    let result = if text.ends_with('\n') {
        stdout.write_all(text.as_bytes())
    } else {
        writeln!(&mut stdout, "{text}")
    };
    result.map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
