//! Purpose: `sigplot-bridge` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Session field updates go to stdout as JSON lines; diagnostics go to stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use sigplot_bridge::api::{Error, ErrorKind, LayerType, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Validation)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `sigplot-bridge --help`."));
            }
        },
    };

    let settings = SessionSettings {
        data_dir: cli.data_dir,
        resolvers: cli.resolvers,
        options: cli.options,
    };

    command_dispatch::dispatch_command(cli.command, settings)
        .map_err(add_transfer_hint)
        .map_err(add_internal_hint)
}

#[derive(Parser)]
#[command(
    name = "sigplot-bridge",
    version,
    about = "Stage plot inputs and drive a browser-side signal plotter",
    long_about = None,
    after_help = r#"EXAMPLES
  $ sigplot-bridge split 'a.tmp | https://example.com/b.tmp'
  $ sigplot-bridge --data-dir files stage '~/data/pulse.tmp|$DATA/noise.prm'
  $ sigplot-bridge plot --href pulse.tmp --array '[1, 2, 3]'
  $ sigplot-bridge invoke change_settings '{"autol": 1000}'

NOTES
  - Inputs are separated by `|`; blank entries are ignored.
  - Entries starting with `http` are downloaded; everything else is linked into --data-dir."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        env = "SIGPLOT_DATA_DIR",
        help = "Staging directory served to the browser (default: current directory)"
    )]
    data_dir: Option<PathBuf>,
    #[arg(
        long = "resolver",
        value_name = "NAME",
        help = "Path resolver applied after ~/$VAR expansion (abspath|realpath); repeatable"
    )]
    resolvers: Vec<String>,
    #[arg(
        long = "option",
        value_name = "KEY=JSON",
        value_parser = parse_option,
        help = "Renderer option passed through verbatim; repeatable"
    )]
    options: Vec<(String, Value)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split an input spec and classify each entry.
    Split {
        #[arg(help = "Inputs separated by `|`")]
        spec: String,
    },
    /// Fetch or link every entry of an input spec into the staging directory.
    Stage {
        #[arg(help = "Inputs separated by `|`")]
        spec: String,
    },
    /// Open a session, queue inputs, and render them as JSON-line field updates.
    Plot {
        #[arg(long = "href", value_name = "SPEC", help = "Href input spec; repeatable")]
        hrefs: Vec<String>,
        #[arg(long = "array", value_name = "JSON", help = "Numeric array (rank <= 2); repeatable")]
        arrays: Vec<String>,
        #[arg(
            long,
            default_value = "1D",
            value_parser = parse_layer_type,
            help = "Layer type announced for href inputs (1D|2D)"
        )]
        layer_type: LayerType,
        #[arg(long, help = "Row length for 2D arrays that cannot infer one")]
        subsize: Option<usize>,
    },
    /// Run a renderer verb (change_settings, overlay_href, overlay_array).
    Invoke {
        verb: String,
        #[arg(value_name = "ARG_JSON", help = "Positional arguments as JSON")]
        arguments: Vec<String>,
    },
    /// Generate shell completions.
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print version information.
    Version,
}

/// Global flags that shape every session the CLI opens.
struct SessionSettings {
    data_dir: Option<PathBuf>,
    resolvers: Vec<String>,
    options: Vec<(String, Value)>,
}

fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected KEY=JSON, got {raw:?}"));
    };
    if key.is_empty() {
        return Err("option key must not be empty".to_string());
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_layer_type(raw: &str) -> Result<LayerType, String> {
    LayerType::parse(raw).map_err(|err| err.to_string())
}

fn parse_inline_json(data: &str) -> Result<Value, Error> {
    serde_json::from_str(data).map_err(|err| {
        Error::new(ErrorKind::Validation)
            .with_message("invalid json")
            .with_hint("Provide a single JSON value (e.g. '[1, 2, 3]').")
            .with_source(err)
    })
}

fn add_transfer_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Transfer || err.hint().is_some() {
        return err;
    }
    err.with_hint("Download failed. Check the URL and network; nothing is retried.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share command/context if it persists.",
    )
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("sigplot-bridge {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "sigplot-bridge",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut source = StdError::source(err);
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    if let Some(status) = err.status() {
        lines.push(format!("status: {status}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
