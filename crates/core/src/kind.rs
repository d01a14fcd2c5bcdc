//! The closed tag set shared by every `Type` and every `Value`.
//!
//! Grounded on the discriminant-first layout the Seq crate uses for its
//! own `Value`/`StackValue` (`crates/core/src/value.rs`,
//! `crates/core/src/tagged_stack.rs`): a single tag drives dispatch, with no
//! open/extensible variants.

use std::fmt;

/// The primitive kinds that can appear nullable, as `wrapper<P>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int,
    Uint,
    Double,
    Bytes,
    String,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Primitive::Bool => "bool",
            Primitive::Int => "int",
            Primitive::Uint => "uint",
            Primitive::Double => "double",
            Primitive::Bytes => "bytes",
            Primitive::String => "string",
        };
        f.write_str(s)
    }
}

/// The closed discriminant shared by types and values.
///
/// `dyn` is the top type; `any` is a serialization wrapper; `error` and
/// `unknown` are first-class values but never user-addressable types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Uint,
    Double,
    Bytes,
    String,
    Duration,
    Timestamp,
    List,
    Map,
    Struct,
    Type,
    Enum,
    Opaque,
    Optional,
    Wrapper(Primitive),
    Error,
    Unknown,
    Dyn,
    Any,
}

impl Kind {
    /// True for `int`/`uint`/`double`, the kinds cross-numeric equality
    /// is defined over.
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Int | Kind::Uint | Kind::Double)
    }

    /// True for `error`/`unknown`: values of this kind short-circuit
    /// operations instead of appearing as container elements (invariant 5).
    pub fn is_control(self) -> bool {
        matches!(self, Kind::Error | Kind::Unknown)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Null => f.write_str("null"),
            Kind::Bool => f.write_str("bool"),
            Kind::Int => f.write_str("int"),
            Kind::Uint => f.write_str("uint"),
            Kind::Double => f.write_str("double"),
            Kind::Bytes => f.write_str("bytes"),
            Kind::String => f.write_str("string"),
            Kind::Duration => f.write_str("duration"),
            Kind::Timestamp => f.write_str("timestamp"),
            Kind::List => f.write_str("list"),
            Kind::Map => f.write_str("map"),
            Kind::Struct => f.write_str("struct"),
            Kind::Type => f.write_str("type"),
            Kind::Enum => f.write_str("enum"),
            Kind::Opaque => f.write_str("opaque"),
            Kind::Optional => f.write_str("optional"),
            Kind::Wrapper(p) => write!(f, "wrapper({p})"),
            Kind::Error => f.write_str("error"),
            Kind::Unknown => f.write_str("unknown"),
            Kind::Dyn => f.write_str("dyn"),
            Kind::Any => f.write_str("any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_kinds() {
        assert!(Kind::Int.is_numeric());
        assert!(Kind::Uint.is_numeric());
        assert!(Kind::Double.is_numeric());
        assert!(!Kind::String.is_numeric());
    }

    #[test]
    fn control_kinds() {
        assert!(Kind::Error.is_control());
        assert!(Kind::Unknown.is_control());
        assert!(!Kind::Dyn.is_control());
    }

    #[test]
    fn display_matches_canonical_names() {
        assert_eq!(Kind::List.to_string(), "list");
        assert_eq!(Kind::Wrapper(Primitive::Int).to_string(), "wrapper(int)");
    }
}
