// crates/remote-storage-cli/src/main.rs
// ============================================================================
// Module: Remote Storage CLI Entry Point
// Description: Command dispatcher for the versioned key-value store.
// Purpose: Map local subcommands onto store, retrieve, count, and history.
// Dependencies: clap, remote-storage-config, remote-storage-core, serde_jcs.
// ============================================================================

//! ## Overview
//! The `remote-storage` binary is a thin local caller over the configured
//! version store. Every successful command prints one line of canonical JSON
//! on stdout; failures print one line on stderr and exit non-zero. Inputs are
//! untrusted: value files are size-limited and keys are validated against the
//! configured dimension layout before the store is touched.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use remote_storage_config::RemoteStorageConfig;
use remote_storage_core::LatestQuery;
use remote_storage_core::MAX_CONTENT_BYTES;
use remote_storage_core::NotFoundPolicy;
use remote_storage_core::StoreError;
use remote_storage_core::Timestamp;
use remote_storage_core::VersionKey;
use remote_storage_core::VersionStore;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "remote-storage", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to `REMOTE_STORAGE_CONFIG`, then
    /// remote-storage.toml).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Version store operations.
    #[command(flatten)]
    Version(VersionCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Operations executed against the configured store.
#[derive(Subcommand, Debug)]
enum VersionCommand {
    /// Record a new version of a key.
    Store(StoreArgs),
    /// Print the newest version matching a partial key.
    Latest(LatestArgs),
    /// Print how many versions an exact key holds.
    Count(KeyArgs),
    /// Print version summaries of an exact key, newest first.
    History(KeyArgs),
    /// Print the store's current timestamp.
    Now,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the config file.
    Validate,
}

/// Key components shared by every version command.
#[derive(Args, Debug)]
struct KeyArgs {
    /// Variable name (mandatory key component).
    #[arg(long, value_name = "NAME")]
    name: String,
    /// Dimension value; repeat for several dimensions.
    #[arg(long = "dim", value_name = "KEY=VALUE", value_parser = parse_dimension)]
    dims: Vec<(String, String)>,
}

/// Arguments for `store`.
#[derive(Args, Debug)]
struct StoreArgs {
    /// Key to write.
    #[command(flatten)]
    key: KeyArgs,
    /// Inline JSON value.
    #[arg(long, value_name = "JSON", required_unless_present = "value_file")]
    value: Option<String>,
    /// File holding the JSON value.
    #[arg(long, value_name = "PATH", conflicts_with = "value")]
    value_file: Option<PathBuf>,
}

/// Arguments for `latest`.
#[derive(Args, Debug)]
struct LatestArgs {
    /// Partial key; omitted dimensions match any value.
    #[command(flatten)]
    key: KeyArgs,
    /// Inclusive lower bound (epoch seconds).
    #[arg(long, value_name = "SECS")]
    after: Option<Timestamp>,
    /// Inclusive upper bound (epoch seconds).
    #[arg(long, value_name = "SECS")]
    before: Option<Timestamp>,
    /// Fail instead of printing `null` when nothing matches.
    #[arg(long, action = ArgAction::SetTrue)]
    fail_if_not_found: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<StoreError> for CliError {
    fn from(error: StoreError) -> Self {
        Self::new(format!("{}: {error}", error.kind()))
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
    match cli.command {
        Commands::Config {
            command: ConfigCommand::Validate,
        } => command_config_validate(cli.config.as_deref()),
        Commands::Version(command) => {
            let config = load_config(cli.config.as_deref())?;
            let store = config
                .open_store()
                .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
            let output = execute(&store, &command)?;
            write_json_value(&output)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Version Commands
// ============================================================================

/// Runs one version command and returns its JSON output.
fn execute(store: &dyn VersionStore, command: &VersionCommand) -> CliResult<Value> {
    match command {
        VersionCommand::Store(args) => {
            let key = exact_key(store, &args.key)?;
            let value = read_value(args)?;
            let receipt = store.store(&key, &value)?;
            to_json(&receipt)
        }
        VersionCommand::Latest(args) => {
            let query = latest_query(store, args)?;
            let policy = NotFoundPolicy::from_flag(args.fail_if_not_found);
            Ok(store.retrieve_latest(&query, policy)?.unwrap_or(Value::Null))
        }
        VersionCommand::Count(args) => {
            let key = exact_key(store, args)?;
            Ok(Value::from(store.retrieve_count(&key)?))
        }
        VersionCommand::History(args) => {
            let key = exact_key(store, args)?;
            to_json(&store.history(&key)?)
        }
        VersionCommand::Now => to_json(&store.current_timestamp()),
    }
}

/// Builds the canonical exact key from CLI arguments.
fn exact_key(store: &dyn VersionStore, args: &KeyArgs) -> CliResult<VersionKey> {
    let dims = args.dims.iter().map(|(name, value)| (name.as_str(), value.as_str()));
    store.schema().key(Some(args.name.as_str()), dims).map_err(|err| StoreError::from(err).into())
}

/// Builds the latest-match query from CLI arguments.
fn latest_query(store: &dyn VersionStore, args: &LatestArgs) -> CliResult<LatestQuery> {
    let dims = args.key.dims.iter().map(|(name, value)| (name.as_str(), value.as_str()));
    let key = store
        .schema()
        .partial_key(Some(args.key.name.as_str()), dims)
        .map_err(|err| CliError::from(StoreError::from(err)))?;
    Ok(LatestQuery::new(key).after(args.after).before(args.before))
}

/// Parses the value to store from `--value` or `--value-file`.
fn read_value(args: &StoreArgs) -> CliResult<Value> {
    let bytes = match (&args.value, &args.value_file) {
        (Some(inline), _) => inline.as_bytes().to_vec(),
        (None, Some(path)) => {
            read_bytes_with_limit(path, MAX_CONTENT_BYTES).map_err(|err| match err {
                ReadLimitError::Io(err) => CliError::new(format!(
                    "failed to read value file {}: {err}",
                    path.display()
                )),
                ReadLimitError::TooLarge {
                    size,
                    limit,
                } => CliError::new(format!(
                    "value file {} is too large: {size} bytes (max {limit})",
                    path.display()
                )),
            })?
        }
        (None, None) => return Err(CliError::new("a value is required".to_string())),
    };
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("value is not valid JSON: {err}")))
}

/// Parses one `KEY=VALUE` dimension argument.
fn parse_dimension(raw: &str) -> Result<(String, String), String> {
    if raw.contains('\0') {
        return Err("dimension must not contain NUL bytes".to_string());
    }
    let (name, value) =
        raw.split_once('=').ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if name.is_empty() {
        return Err(format!("dimension name missing in `{raw}`"));
    }
    Ok((name.to_string(), value.to_string()))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Output of `config validate`.
#[derive(Serialize)]
struct ConfigValidateOutput {
    /// Always `valid` on success.
    status: &'static str,
    /// Database file the store would open.
    store_path: String,
    /// Configured dimension layout.
    dimensions: Vec<String>,
    /// Per-key version cap.
    max_versions: u64,
}

/// Loads configuration from the explicit path or defaults.
fn load_config(path: Option<&Path>) -> CliResult<RemoteStorageConfig> {
    RemoteStorageConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Executes the config validation command.
fn command_config_validate(path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(path)?;
    let output = ConfigValidateOutput {
        status: "valid",
        store_path: config.store.path.display().to_string(),
        dimensions: config.versioning.dimensions.clone(),
        max_versions: config.versioning.max_versions,
    };
    write_json_value(&to_json(&output)?)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Converts a serializable output into a JSON value.
fn to_json<T: Serialize>(value: &T) -> CliResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))
}

/// Writes a canonical JSON value to stdout.
fn write_json_value(value: &Value) -> CliResult<()> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout
        .write_all(&bytes)
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
