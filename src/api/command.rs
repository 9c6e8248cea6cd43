//! Purpose: Typed renderer commands and the verb lookup table.
//! Exports: `Verb`, `VERB_TABLE`, `Command`, `CommandArgument`.
//! Role: Replaces attribute-style passthrough with an explicit whitelist.
//! Invariants: Verb names are matched exactly; lookup never lowercases for the caller.
//! Invariants: A `Command` is built per action and handed off; it is never reused.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Value, json};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verb {
    ChangeSettings,
    OverlayHref,
    OverlayArray,
}

pub const VERB_TABLE: &[(&str, Verb)] = &[
    ("change_settings", Verb::ChangeSettings),
    ("overlay_href", Verb::OverlayHref),
    ("overlay_array", Verb::OverlayArray),
];

impl Verb {
    pub fn from_name(name: &str) -> Option<Self> {
        VERB_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, verb)| *verb)
    }

    pub fn name(self) -> &'static str {
        VERB_TABLE
            .iter()
            .find(|(_, verb)| *verb == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommandArgument {
    Json(Value),
    /// Native-endian `f32` samples.
    Float32Buffer(Vec<u8>),
}

impl CommandArgument {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            CommandArgument::Json(value) => Some(value),
            CommandArgument::Float32Buffer(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CommandArgument::Json(value) => value.clone(),
            CommandArgument::Float32Buffer(bytes) => json!({
                "dtype": "float32",
                "base64": BASE64.encode(bytes),
            }),
        }
    }
}

impl Serialize for CommandArgument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CommandArgument::Json(value) => value.serialize(serializer),
            CommandArgument::Float32Buffer(bytes) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("dtype", "float32")?;
                map.serialize_entry("base64", &BASE64.encode(bytes))?;
                map.end()
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Command {
    pub command: String,
    pub arguments: Vec<CommandArgument>,
}

impl Command {
    pub fn new(verb: Verb, arguments: Vec<CommandArgument>) -> Self {
        Self {
            command: verb.name().to_string(),
            arguments,
        }
    }
}
