//! Factories, schema reflection, struct bridging and serialization for the
//! CEL value/type model defined in `cel-values-core`.
//!
//! `cel-values-core` is the shared vocabulary (kinds, types, values, memory
//! disciplines, activation); this crate is where those types meet a host
//! schema (protobuf, via `prost-reflect`) and the outside world (JSON,
//! `google.protobuf.Any`, a `bincode` persistence format).

pub mod builder;
pub mod factory;
pub mod reflect;
pub mod serialize;
pub mod struct_bridge;

pub use builder::{ListBuilder, MapBuilder, StructBuilder};
pub use factory::{TypeFactory, ValueFactory};
pub use reflect::{FieldSchema, ProtobufSchemaProvider, SchemaProvider, TypeIntrospector, TypeReflector};
pub use serialize::{deserialize, SerializeError, TypedMapKey, TypedValue, ValueSerialize};
pub use struct_bridge::{AnyResolver, MapStruct, ProtoStruct};
