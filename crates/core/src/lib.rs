//! Value and type model for a sandboxed expression-language evaluator
//! (CEL): kinds, types, values, memory disciplines and activation.
//!
//! This crate is the shared vocabulary that the evaluator,
//! factories and reflector build on; see `cel-values-runtime` for the
//! factories, introspector/reflector, struct bridge and
//! serialization built on top of it.
//!
//! The conformance harness's line-pipe protocol (stdin/stdout, base64
//! request/response framing) is outside this crate's scope — it is a
//! collaborator documented for completeness, not implemented here:
//! line 1 is a command (`parse`/`check`/`eval`/`ping`), line 2 is base64 of
//! the request protobuf, the response is base64 of the response protobuf on
//! one line; exit 0 on clean shutdown, 1 on startup failure, 2 on unknown
//! command.

pub mod activation;
pub mod debug;
pub mod error;
pub mod kind;
pub mod memory;
pub mod numeric;
pub mod types;
pub mod unknown;
pub mod value;

pub use activation::{Activation, Overload};
pub use error::{CelError, ErrorCode, ErrorPayload};
pub use kind::{Kind, Primitive};
pub use memory::{Arena, Handle, MemoryManager, MemoryStats};
pub use types::{Type, TypeData};
pub use unknown::{AttributeTrail, FunctionResultMarker, Selector, Unknown};
pub use value::{
    Duration, EnumValue, ListBacking, MapBacking, MapKey, OpaqueBacking, OptionalValue, OwnedList,
    OwnedMap, Qualifier, StructBacking, Timestamp, Value,
};
