//! Purpose: Hold top-level CLI command dispatch for `sigplot-bridge`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Only `plot` and `invoke` open sessions; their updates stream to stdout.
//! Invariants: Every command resolves configuration through `SessionConfig::from_options`.

use super::*;

use sigplot_bridge::api::{
    ArrayOptions, JsonLinesChannel, NdArray, PlotSession, ProgressFn, RemoteFetcher,
    RenderOptions, SessionConfig, classify, split_inputs,
};
use sigplot_bridge::core::inputs::prepare_href_input;
use tracing::debug;

pub(super) fn dispatch_command(
    command: Command,
    settings: SessionSettings,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::aot::generate(shell, &mut cmd, "sigplot-bridge", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Split { spec } => {
            let inputs: Vec<Value> = split_inputs(&spec)
                .into_iter()
                .map(|input| {
                    let kind = classify(&input).as_str();
                    json!({ "input": input, "kind": kind })
                })
                .collect();
            emit_json(json!({ "inputs": inputs }));
            Ok(RunOutcome::ok())
        }
        Command::Stage { spec } => {
            let config = session_config(settings)?;
            let resolvers = config.path_resolvers.clone().unwrap_or_default();
            let mut report = |fraction: f64| -> Result<(), Error> {
                debug!(progress = fraction, "download progress");
                Ok(())
            };
            let staged = prepare_href_input(
                &spec,
                &config.data_dir,
                &RemoteFetcher::new(),
                &resolvers,
                Some(&mut report as &mut ProgressFn<'_>),
            )?;
            let staged: Vec<String> = staged
                .iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect();
            emit_json(json!({ "staged": staged }));
            Ok(RunOutcome::ok())
        }
        Command::Plot {
            hrefs,
            arrays,
            layer_type,
            subsize,
        } => {
            let config = session_config(settings)?;
            let mut session = PlotSession::open(config, JsonLinesChannel::new(io::stdout()))?;
            for spec in &hrefs {
                session.add_href_input(spec)?;
            }
            for raw in &arrays {
                let array = NdArray::from_json(&parse_inline_json(raw)?)?;
                session.add_array_input(array, ArrayOptions::default())?;
            }
            session.render(RenderOptions {
                layer_type,
                subsize,
            })?;
            Ok(RunOutcome::ok())
        }
        Command::Invoke { verb, arguments } => {
            let arguments = arguments
                .iter()
                .map(|raw| parse_inline_json(raw))
                .collect::<Result<Vec<_>, _>>()?;
            let config = session_config(settings)?;
            let mut session = PlotSession::open(config, JsonLinesChannel::new(io::stdout()))?;
            session.invoke(&verb, arguments)?;
            Ok(RunOutcome::ok())
        }
    }
}

fn session_config(settings: SessionSettings) -> Result<SessionConfig, Error> {
    let mut options: Map<String, Value> = settings.options.into_iter().collect();
    if let Some(data_dir) = settings.data_dir {
        options.insert(
            "data_dir".to_string(),
            Value::String(data_dir.to_string_lossy().into_owned()),
        );
    }
    if !settings.resolvers.is_empty() {
        options.insert("path_resolvers".to_string(), json!(settings.resolvers));
    }
    SessionConfig::from_options(options)
}
