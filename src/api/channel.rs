//! Purpose: The seam between a plot session and whatever mirrors its fields to the browser.
//! Exports: `SyncChannel`, `FieldUpdate`, `MemoryChannel`, `JsonLinesChannel`.
//! Role: Sessions only write fields; transports decide how those writes travel.
//! Invariants: Updates are delivered in the order the session publishes them.
//! Invariants: Snapshot fields always carry the full ordered collection.

use std::collections::BTreeMap;
use std::io::Write;

use serde_json::{Map, Value, json};

use super::command::Command;
use crate::core::array::{ArrayLayer, HrefLayer};
use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub enum FieldUpdate {
    CommandAndArguments(Command),
    HrefObj(HrefLayer),
    ArrayObj(ArrayLayer),
    OldHrefs(Vec<HrefLayer>),
    OldArrays(Vec<ArrayLayer>),
    Progress(f64),
    Done(bool),
    Options(Map<String, Value>),
}

impl FieldUpdate {
    pub fn field(&self) -> &'static str {
        match self {
            FieldUpdate::CommandAndArguments(_) => "command_and_arguments",
            FieldUpdate::HrefObj(_) => "href_obj",
            FieldUpdate::ArrayObj(_) => "array_obj",
            FieldUpdate::OldHrefs(_) => "oldHrefs",
            FieldUpdate::OldArrays(_) => "oldArrays",
            FieldUpdate::Progress(_) => "progress",
            FieldUpdate::Done(_) => "done",
            FieldUpdate::Options(_) => "options",
        }
    }

    pub fn value(&self) -> Result<Value, Error> {
        let value = match self {
            FieldUpdate::CommandAndArguments(command) => serde_json::to_value(command),
            FieldUpdate::HrefObj(layer) => serde_json::to_value(layer),
            FieldUpdate::ArrayObj(layer) => serde_json::to_value(layer),
            FieldUpdate::OldHrefs(layers) => serde_json::to_value(layers),
            FieldUpdate::OldArrays(layers) => serde_json::to_value(layers),
            FieldUpdate::Progress(progress) => Ok(json!(progress)),
            FieldUpdate::Done(done) => Ok(json!(done)),
            FieldUpdate::Options(options) => Ok(Value::Object(options.clone())),
        };
        value.map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("failed to encode {} update", self.field()))
                .with_source(err)
        })
    }
}

pub trait SyncChannel {
    fn publish(&mut self, update: FieldUpdate) -> Result<(), Error>;

    /// Clears whatever the renderer is currently displaying.
    fn clear_display(&mut self) -> Result<(), Error>;
}

impl<C: SyncChannel + ?Sized> SyncChannel for Box<C> {
    fn publish(&mut self, update: FieldUpdate) -> Result<(), Error> {
        (**self).publish(update)
    }

    fn clear_display(&mut self) -> Result<(), Error> {
        (**self).clear_display()
    }
}

/// Records every update in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryChannel {
    updates: Vec<FieldUpdate>,
    latest: BTreeMap<&'static str, FieldUpdate>,
    clears: usize,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> &[FieldUpdate] {
        &self.updates
    }

    pub fn latest(&self, field: &str) -> Option<&FieldUpdate> {
        self.latest.get(field)
    }

    pub fn commands(&self) -> Vec<&Command> {
        self.updates
            .iter()
            .filter_map(|update| match update {
                FieldUpdate::CommandAndArguments(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl SyncChannel for MemoryChannel {
    fn publish(&mut self, update: FieldUpdate) -> Result<(), Error> {
        self.latest.insert(update.field(), update.clone());
        self.updates.push(update);
        Ok(())
    }

    fn clear_display(&mut self) -> Result<(), Error> {
        self.clears += 1;
        Ok(())
    }
}

/// Writes one JSON object per line: `{"field": .., "value": ..}`.
pub struct JsonLinesChannel<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesChannel<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, value: &Value) -> Result<(), Error> {
        serde_json::to_writer(&mut self.writer, value)
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode channel line")
                    .with_source(err)
            })?;
        self.writer
            .write_all(b"\n")
            .and_then(|()| self.writer.flush())
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to write channel line")
                    .with_source(err)
            })
    }
}

impl<W: Write> SyncChannel for JsonLinesChannel<W> {
    fn publish(&mut self, update: FieldUpdate) -> Result<(), Error> {
        let line = json!({ "field": update.field(), "value": update.value()? });
        self.write_line(&line)
    }

    fn clear_display(&mut self) -> Result<(), Error> {
        self.write_line(&json!({ "event": "clear_display" }))
    }
}
