//! Purpose: Orchestrate inputs for one displayed plot and announce them to the renderer.
//! Exports: `PlotSession`, `PendingInput`, `SessionState`, `RenderOptions`.
//! Role: PlotSession; owns the pending queue and the staged (announced) layers.
//! Invariants: Staged layers are unique and keep first-announced order (overlay z-order).
//! Invariants: Every staged-set mutation publishes the full snapshot, then the newest layer.
//! Invariants: A failed render clears the display but never retracts earlier announcements.
#![allow(clippy::result_large_err)]

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::channel::{FieldUpdate, SyncChannel};
use super::command::{Command, CommandArgument, VERB_TABLE, Verb};
use super::config::{SessionConfig, SessionTemplate};
use crate::core::array::{ArrayLayer, ArrayOptions, HrefLayer, LayerType, NdArray};
use crate::core::error::{Error, ErrorKind};
use crate::core::fetch::{ProgressFn, RemoteFetcher};
use crate::core::inputs::prepare_href_input;
use crate::core::resolve::ResolverChain;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Empty,
    Accumulating,
    Rendered,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PendingInput {
    Array {
        array: NdArray,
        options: ArrayOptions,
    },
    /// A path that has already been staged.
    Href(String),
}

impl PendingInput {
    pub fn array(array: NdArray) -> Self {
        PendingInput::Array {
            array,
            options: ArrayOptions::default(),
        }
    }

    pub fn href(path: impl Into<String>) -> Self {
        PendingInput::Href(path.into())
    }

    /// Strings become staged hrefs; anything else must parse as a numeric array.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        match value {
            Value::String(path) => Ok(PendingInput::Href(path.clone())),
            other => Ok(PendingInput::array(NdArray::from_json(other)?)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RenderOptions {
    /// Layer type announced for href inputs.
    pub layer_type: LayerType,
    /// Fallback subsize for array inputs that did not set their own.
    pub subsize: Option<usize>,
}

pub struct PlotSession<C: SyncChannel> {
    channel: C,
    data_dir: PathBuf,
    path_resolvers: ResolverChain,
    options: Map<String, Value>,
    fetcher: RemoteFetcher,
    pending: Vec<PendingInput>,
    staged_hrefs: Vec<HrefLayer>,
    staged_arrays: Vec<ArrayLayer>,
    progress: f64,
    done: bool,
}

impl<C: SyncChannel> PlotSession<C> {
    pub fn open(config: SessionConfig, channel: C) -> Result<Self, Error> {
        Self::open_with(&SessionTemplate::default(), config, channel)
    }

    /// Opens a session and publishes its renderer options once.
    pub fn open_with(
        template: &SessionTemplate,
        config: SessionConfig,
        channel: C,
    ) -> Result<Self, Error> {
        let path_resolvers = template.resolvers_for(&config);
        let mut session = Self {
            channel,
            data_dir: config.data_dir,
            path_resolvers,
            options: config.options,
            fetcher: RemoteFetcher::new(),
            pending: Vec::new(),
            staged_hrefs: Vec::new(),
            staged_arrays: Vec::new(),
            progress: 0.0,
            done: false,
        };
        let options = session.options.clone();
        session.channel.publish(FieldUpdate::Options(options))?;
        Ok(session)
    }

    pub fn with_fetcher(mut self, fetcher: RemoteFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_resolvers(&self) -> &ResolverChain {
        &self.path_resolvers
    }

    pub fn set_path_resolvers(&mut self, resolvers: ResolverChain) {
        self.path_resolvers = resolvers;
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn pending(&self) -> &[PendingInput] {
        &self.pending
    }

    pub fn staged_hrefs(&self) -> &[HrefLayer] {
        &self.staged_hrefs
    }

    pub fn staged_arrays(&self) -> &[ArrayLayer] {
        &self.staged_arrays
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn state(&self) -> SessionState {
        if self.done {
            SessionState::Rendered
        } else if self.pending.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Accumulating
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    pub fn available_commands(&self) -> Vec<&'static str> {
        VERB_TABLE.iter().map(|(name, _)| *name).collect()
    }

    /// Validates `array` now and queues it; layer type and subsize are
    /// derived again at render time.
    pub fn add_array_input(&mut self, array: NdArray, options: ArrayOptions) -> Result<(), Error> {
        ArrayLayer::from_array(&array, &options)?;
        self.pending.push(PendingInput::Array { array, options });
        Ok(())
    }

    /// Splits `spec`, fetches or stages every entry, and queues one href per
    /// entry. Returns the staged paths in order.
    pub fn add_href_input(&mut self, spec: &str) -> Result<Vec<PathBuf>, Error> {
        let prepared = self.prepare_hrefs(spec)?;
        for path in &prepared {
            self.pending
                .push(PendingInput::Href(path.to_string_lossy().into_owned()));
        }
        Ok(prepared)
    }

    /// Queues an input as-is. Nothing is validated until render.
    pub fn push_input(&mut self, input: PendingInput) {
        self.pending.push(input);
    }

    /// Returns `false` when an equal layer was already announced.
    pub fn announce_array(&mut self, layer: ArrayLayer) -> Result<bool, Error> {
        if self.staged_arrays.contains(&layer) {
            debug!("array layer already announced");
            return Ok(false);
        }
        self.staged_arrays.push(layer.clone());
        self.channel
            .publish(FieldUpdate::OldArrays(self.staged_arrays.clone()))?;
        self.channel.publish(FieldUpdate::ArrayObj(layer))?;
        Ok(true)
    }

    /// Returns `false` when an equal layer was already announced.
    pub fn announce_href(&mut self, layer: HrefLayer) -> Result<bool, Error> {
        if self.staged_hrefs.contains(&layer) {
            debug!(filename = %layer.filename, "href layer already announced");
            return Ok(false);
        }
        self.staged_hrefs.push(layer.clone());
        self.channel
            .publish(FieldUpdate::OldHrefs(self.staged_hrefs.clone()))?;
        self.channel.publish(FieldUpdate::HrefObj(layer))?;
        Ok(true)
    }

    /// Announces every pending input in order, then sets `done`.
    pub fn render(&mut self, options: RenderOptions) -> Result<(), Error> {
        info!(
            pending = self.pending.len(),
            layer_type = options.layer_type.as_str(),
            "rendering"
        );
        match self.render_pending(options) {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Err(clear_err) = self.channel.clear_display() {
                    warn!(error = %clear_err, "failed to clear display after render error");
                }
                Err(err)
            }
        }
    }

    fn render_pending(&mut self, options: RenderOptions) -> Result<(), Error> {
        let pending = self.pending.clone();
        for input in pending {
            match input {
                PendingInput::Array {
                    array,
                    options: mut array_options,
                } => {
                    if array_options.subsize.is_none() {
                        array_options.subsize = options.subsize;
                    }
                    let layer = ArrayLayer::from_array(&array, &array_options)?;
                    self.announce_array(layer)?;
                }
                PendingInput::Href(filename) => {
                    self.announce_href(HrefLayer {
                        filename,
                        layer_type: options.layer_type,
                    })?;
                }
            }
        }
        self.done = true;
        self.channel.publish(FieldUpdate::Done(true))
    }

    /// Runs a renderer verb by name. Names outside the verb table fail with
    /// a `Dispatch` error.
    pub fn invoke(&mut self, name: &str, arguments: Vec<Value>) -> Result<(), Error> {
        let verb = Verb::from_name(name).ok_or_else(|| {
            Error::new(ErrorKind::Dispatch)
                .with_message(format!("session has no command {name:?}"))
                .with_hint(format!(
                    "Available commands: {}.",
                    self.available_commands().join(", ")
                ))
        })?;
        debug!(verb = verb.name(), arguments = arguments.len(), "dispatching command");
        match verb {
            Verb::ChangeSettings => {
                let arguments = arguments.into_iter().map(CommandArgument::Json).collect();
                self.send(verb, arguments)
            }
            Verb::OverlayArray => self.dispatch_overlay_array(arguments),
            Verb::OverlayHref => self.dispatch_overlay_href(arguments),
        }
    }

    pub fn change_settings(&mut self, settings: Map<String, Value>) -> Result<(), Error> {
        self.invoke(Verb::ChangeSettings.name(), vec![Value::Object(settings)])
    }

    pub fn overlay_href(&mut self, spec: &str) -> Result<(), Error> {
        self.invoke(Verb::OverlayHref.name(), vec![Value::from(spec)])
    }

    pub fn overlay_array(&mut self, array: &NdArray) -> Result<(), Error> {
        self.send(
            Verb::OverlayArray,
            vec![CommandArgument::Float32Buffer(array.to_f32_bytes())],
        )
    }

    fn dispatch_overlay_array(&mut self, arguments: Vec<Value>) -> Result<(), Error> {
        let mut arguments = arguments.into_iter();
        let first = arguments.next().ok_or_else(|| {
            Error::new(ErrorKind::Validation).with_message("overlay_array needs an array argument")
        })?;
        let array = NdArray::from_json(&first)
            .map_err(|err| err.with_hint("overlay_array takes a numeric array."))?;
        let mut converted = vec![CommandArgument::Float32Buffer(array.to_f32_bytes())];
        converted.extend(arguments.map(CommandArgument::Json));
        self.send(Verb::OverlayArray, converted)
    }

    fn dispatch_overlay_href(&mut self, arguments: Vec<Value>) -> Result<(), Error> {
        let spec = match arguments.first() {
            Some(Value::String(spec)) => spec.clone(),
            _ => {
                return Err(Error::new(ErrorKind::Validation)
                    .with_message("overlay_href needs an input spec string"));
            }
        };
        for path in self.prepare_hrefs(&spec)? {
            let mut converted: Vec<CommandArgument> = arguments
                .iter()
                .cloned()
                .map(CommandArgument::Json)
                .collect();
            converted[0] = CommandArgument::Json(Value::from(path.to_string_lossy().into_owned()));
            self.send(Verb::OverlayHref, converted)?;
        }
        Ok(())
    }

    fn send(&mut self, verb: Verb, arguments: Vec<CommandArgument>) -> Result<(), Error> {
        self.channel
            .publish(FieldUpdate::CommandAndArguments(Command::new(verb, arguments)))
    }

    fn prepare_hrefs(&mut self, spec: &str) -> Result<Vec<PathBuf>, Error> {
        let channel = &mut self.channel;
        let progress = &mut self.progress;
        let mut report = |fraction: f64| -> Result<(), Error> {
            *progress = fraction;
            channel.publish(FieldUpdate::Progress(fraction))
        };
        prepare_href_input(
            spec,
            &self.data_dir,
            &self.fetcher,
            &self.path_resolvers,
            Some(&mut report as &mut ProgressFn<'_>),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{PendingInput, PlotSession, RenderOptions, SessionState};
    use crate::api::channel::{FieldUpdate, MemoryChannel};
    use crate::api::command::CommandArgument;
    use crate::api::config::SessionConfig;
    use crate::core::array::{ArrayLayer, ArrayOptions, HrefLayer, LayerType, NdArray};
    use crate::core::error::ErrorKind;
    use serde_json::{Map, json};

    fn session() -> PlotSession<MemoryChannel> {
        PlotSession::open(SessionConfig::new(), MemoryChannel::new()).expect("session")
    }

    #[test]
    fn new_session_is_empty_and_publishes_options() {
        let session = session();
        assert_eq!(session.state(), SessionState::Empty);
        assert_eq!(session.progress(), 0.0);
        assert!(!session.done());
        assert_eq!(
            session.channel().updates(),
            &[FieldUpdate::Options(Map::new())]
        );
    }

    #[test]
    fn render_announces_hrefs_and_arrays_then_sets_done() {
        let mut session = session();
        session.push_input(PendingInput::from_json(&json!("foo.tmp")).expect("href"));
        session.push_input(PendingInput::from_json(&json!([1, 2, 3])).expect("array"));
        assert_eq!(session.state(), SessionState::Accumulating);

        session.render(RenderOptions::default()).expect("render");

        assert_eq!(
            session.staged_hrefs(),
            &[HrefLayer {
                filename: "foo.tmp".to_string(),
                layer_type: LayerType::OneD,
            }]
        );
        assert_eq!(
            serde_json::to_value(session.staged_arrays()).expect("json"),
            json!([{"data": [1.0, 2.0, 3.0], "overrides": {}, "layerType": "1D"}])
        );
        assert!(session.done());
        assert_eq!(session.state(), SessionState::Rendered);
        assert_eq!(
            session.channel().latest("done"),
            Some(&FieldUpdate::Done(true))
        );
    }

    #[test]
    fn identical_announcements_are_deduplicated() {
        let mut session = session();
        let layer = HrefLayer {
            filename: "foo.tmp".to_string(),
            layer_type: LayerType::OneD,
        };
        assert!(session.announce_href(layer.clone()).expect("first"));
        assert!(!session.announce_href(layer).expect("second"));
        assert_eq!(session.staged_hrefs().len(), 1);

        let href_objs = session
            .channel()
            .updates()
            .iter()
            .filter(|update| matches!(update, FieldUpdate::HrefObj(_)))
            .count();
        assert_eq!(href_objs, 1);
    }

    #[test]
    fn announce_publishes_snapshot_then_newest() {
        let mut session = session();
        let first = ArrayLayer::from_array(&NdArray::from_vec(vec![1.0]), &ArrayOptions::default())
            .expect("layer");
        let second = ArrayLayer::from_array(&NdArray::from_vec(vec![2.0]), &ArrayOptions::default())
            .expect("layer");
        session.announce_array(first.clone()).expect("first");
        session.announce_array(second.clone()).expect("second");

        let updates = session.channel().updates();
        assert_eq!(
            &updates[updates.len() - 2..],
            &[
                FieldUpdate::OldArrays(vec![first, second.clone()]),
                FieldUpdate::ArrayObj(second),
            ]
        );
    }

    #[test]
    fn rerender_does_not_duplicate_layers() {
        let mut session = session();
        session.push_input(PendingInput::href("foo.tmp"));
        session.render(RenderOptions::default()).expect("first render");
        session.push_input(PendingInput::href("bar.tmp"));
        session.render(RenderOptions::default()).expect("second render");
        let names: Vec<&str> = session
            .staged_hrefs()
            .iter()
            .map(|layer| layer.filename.as_str())
            .collect();
        assert_eq!(names, vec!["foo.tmp", "bar.tmp"]);
    }

    #[test]
    fn add_array_infers_two_d_and_rejects_rank_three() {
        let mut session = session();
        let array = NdArray::from_json(&json!([[1, 2, 3, 4], [5, 6, 7, 8]])).expect("array");
        session
            .add_array_input(array, ArrayOptions::default())
            .expect("add");
        session.render(RenderOptions::default()).expect("render");
        let layer = &session.staged_arrays()[0];
        assert_eq!(layer.layer_type, LayerType::TwoD);
        assert_eq!(layer.data.len(), 8);
        assert_eq!(layer.overrides.get("subsize"), Some(&json!(4)));

        let cube = NdArray::new(vec![0.0; 8], vec![2, 4, 1]).expect("cube");
        let err = session
            .add_array_input(cube, ArrayOptions::default())
            .expect_err("rank 3");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn failed_render_clears_display_and_keeps_earlier_announcements() {
        let mut session = session();
        session.push_input(PendingInput::href("foo.tmp"));
        session.push_input(PendingInput::array(
            NdArray::new(vec![0.0; 8], vec![2, 4, 1]).expect("cube"),
        ));
        session.push_input(PendingInput::href("never.tmp"));

        let err = session.render(RenderOptions::default()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(session.channel().clears(), 1);
        assert_eq!(session.staged_hrefs().len(), 1);
        assert!(!session.done());
    }

    #[test]
    fn render_subsize_fills_in_for_arrays() {
        let mut session = session();
        session.push_input(PendingInput::Array {
            array: NdArray::from_vec(vec![1.0; 6]),
            options: ArrayOptions {
                layer_type: Some(LayerType::TwoD),
                ..ArrayOptions::default()
            },
        });
        session
            .render(RenderOptions {
                layer_type: LayerType::OneD,
                subsize: Some(3),
            })
            .expect("render");
        assert_eq!(
            session.staged_arrays()[0].overrides.get("subsize"),
            Some(&json!(3))
        );
    }

    #[test]
    fn change_settings_is_published_verbatim() {
        let mut session = session();
        let mut settings = Map::new();
        settings.insert("autol".to_string(), json!(1000));
        session.change_settings(settings.clone()).expect("change");
        let commands = session.channel().commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].command, "change_settings");
        assert_eq!(
            commands[0].arguments,
            vec![CommandArgument::Json(json!({"autol": 1000}))]
        );
    }

    #[test]
    fn unknown_or_uppercase_verbs_are_dispatch_errors() {
        let mut session = session();
        for name in ["foobar", "CHANGE_SETTINGS", "render"] {
            let err = session.invoke(name, vec![json!("blah")]).expect_err("err");
            assert_eq!(err.kind(), ErrorKind::Dispatch, "{name}");
        }
        assert!(session.channel().commands().is_empty());
    }

    #[test]
    fn overlay_array_converts_to_f32_buffer() {
        let mut session = session();
        session
            .invoke("overlay_array", vec![json!([1, 2, 3])])
            .expect("overlay");
        let expected: Vec<u8> = [1.0f32, 2.0, 3.0]
            .iter()
            .flat_map(|value| value.to_ne_bytes())
            .collect();
        let commands = session.channel().commands();
        assert_eq!(commands[0].command, "overlay_array");
        assert_eq!(
            commands[0].arguments,
            vec![CommandArgument::Float32Buffer(expected)]
        );

        let err = session
            .invoke("overlay_array", vec![json!(["foo", "bar", "baz"])])
            .expect_err("non numeric");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn available_commands_match_the_verb_table() {
        assert_eq!(
            session().available_commands(),
            vec!["change_settings", "overlay_href", "overlay_array"]
        );
    }
}
