//! The `unknown` value payload.
//!
//! No direct Seq counterpart — Seq has no deferred-resolution concept.
//! Modeled as a general "mergeable set" shape: two
//! `BTreeSet`s (attribute trails, function-result markers) unioned on
//! merge, ordered so merge is deterministic regardless of which side a
//! marker originated on.

use std::fmt;
use std::sync::Arc;

/// One step in an attribute trail: a field name or an index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Selector {
    Field(Arc<str>),
    Index(i64),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Field(name) => write!(f, ".{name}"),
            Selector::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A variable, then a chain of field/index selectors, identifying a piece of
/// input whose value was not yet available when it was read.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeTrail {
    pub root: Arc<str>,
    pub selectors: Vec<Selector>,
}

impl AttributeTrail {
    pub fn root(root: impl Into<Arc<str>>) -> AttributeTrail {
        AttributeTrail {
            root: root.into(),
            selectors: Vec::new(),
        }
    }

    pub fn with_selector(mut self, selector: Selector) -> AttributeTrail {
        self.selectors.push(selector);
        self
    }
}

impl fmt::Display for AttributeTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for selector in &self.selectors {
            write!(f, "{selector}")?;
        }
        Ok(())
    }
}

/// Marks a function call whose result could not be computed because one of
/// its arguments was itself unknown. `call_id` disambiguates repeated calls
/// to the same function at different call sites within one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionResultMarker {
    pub function_name: Arc<str>,
    pub call_id: u64,
}

/// The `unknown` value's payload: a set of attribute trails and/or
/// function-result markers whose resolution was deferred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unknown {
    attribute_trails: std::collections::BTreeSet<AttributeTrail>,
    function_results: std::collections::BTreeSet<FunctionResultMarker>,
}

impl Unknown {
    pub fn new() -> Unknown {
        Unknown::default()
    }

    pub fn from_attribute(trail: AttributeTrail) -> Unknown {
        let mut u = Unknown::new();
        u.attribute_trails.insert(trail);
        u
    }

    pub fn from_function_result(marker: FunctionResultMarker) -> Unknown {
        let mut u = Unknown::new();
        u.function_results.insert(marker);
        u
    }

    pub fn attribute_trails(&self) -> impl Iterator<Item = &AttributeTrail> {
        self.attribute_trails.iter()
    }

    pub fn function_results(&self) -> impl Iterator<Item = &FunctionResultMarker> {
        self.function_results.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.attribute_trails.is_empty() && self.function_results.is_empty()
    }

    /// Unknowns merge by set union — unlike errors, which never
    /// merge and take the leftmost.
    pub fn merge(&self, other: &Unknown) -> Unknown {
        Unknown {
            attribute_trails: self
                .attribute_trails
                .union(&other.attribute_trails)
                .cloned()
                .collect(),
            function_results: self
                .function_results
                .union(&other.function_results)
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_unions_attribute_trails() {
        let a = Unknown::from_attribute(AttributeTrail::root("x"));
        let b = Unknown::from_attribute(AttributeTrail::root("y"));
        let merged = a.merge(&b);
        assert_eq!(merged.attribute_trails().count(), 2);
    }

    #[test]
    fn merge_is_idempotent_on_overlap() {
        let a = Unknown::from_attribute(AttributeTrail::root("x"));
        let merged = a.merge(&a);
        assert_eq!(merged.attribute_trails().count(), 1);
    }

    #[test]
    fn display_renders_dotted_path() {
        let trail = AttributeTrail::root("req")
            .with_selector(Selector::Field(Arc::from("headers")))
            .with_selector(Selector::Index(0));
        assert_eq!(trail.to_string(), "req.headers[0]");
    }

    #[test]
    fn merge_unions_function_results() {
        let a = Unknown::from_function_result(FunctionResultMarker {
            function_name: Arc::from("f"),
            call_id: 1,
        });
        let b = Unknown::from_function_result(FunctionResultMarker {
            function_name: Arc::from("f"),
            call_id: 2,
        });
        assert_eq!(a.merge(&b).function_results().count(), 2);
    }
}
