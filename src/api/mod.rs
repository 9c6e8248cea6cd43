//! Purpose: Public surface for embedding plot sessions.
//! Exports: Session, channel, command, and configuration types plus core re-exports.
//! Role: The boundary embedding kernels and the CLI build on; core stays reachable via `core`.
//! Invariants: Sessions talk to the outside world only through `SyncChannel`.

mod channel;
mod command;
mod config;
mod session;

pub use crate::core::array::{ArrayLayer, ArrayOptions, HrefLayer, LayerType, NdArray};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::fetch::{ProgressFn, RemoteFetcher};
pub use crate::core::inputs::{InputKind, classify, split_inputs};
pub use crate::core::resolve::{Resolver, ResolverChain};
pub use channel::{FieldUpdate, JsonLinesChannel, MemoryChannel, SyncChannel};
pub use command::{Command, CommandArgument, VERB_TABLE, Verb};
pub use config::{BUILTIN_RESOLVERS, SessionConfig, SessionTemplate, builtin_resolver};
pub use session::{PendingInput, PlotSession, RenderOptions, SessionState};
