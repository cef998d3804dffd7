//! Read-only traversal of the specification `Value` tree with transparent
//! `$ref` resolution, cycle detection, and memoization of resolved targets.

use crate::{PATH_SEPARATOR, REF_FIELD};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

type TraverseResult<'a> = Result<SearchResult<'a>, TraverserError>;

#[derive(Debug)]
pub enum SearchResult<'a> {
    /// A search yielding a cached resolution of a `$ref`.
    Arc(Arc<Value>),
    /// A search yielding a plain sub-node.
    Ref(&'a Value),
}

impl<'a> SearchResult<'a> {
    pub fn value(&'a self) -> &'a Value {
        match self {
            SearchResult::Arc(arc_val) => arc_val,
            SearchResult::Ref(val) => val,
        }
    }

    /// An owning handle to the node, cloning only when the node was borrowed.
    pub fn to_arc(&self) -> Arc<Value> {
        match self {
            SearchResult::Arc(arc_val) => Arc::clone(arc_val),
            SearchResult::Ref(val) => Arc::new((*val).clone()),
        }
    }
}

#[derive(Debug)]
pub enum TraverserError {
    MissingField(String),
    UnexpectedKind { expected: &'static str, found: String },
    CircularReference(String),
    UnresolvedReference(String),
}

impl Display for TraverserError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TraverserError::MissingField(field) => {
                write!(f, "The field '{}' is missing", field)
            }
            TraverserError::UnexpectedKind { expected, found } => {
                write!(f, "Expected a {} but found {}", expected, found)
            }
            TraverserError::CircularReference(reference) => {
                write!(f, "Circular reference found while resolving '{}'", reference)
            }
            TraverserError::UnresolvedReference(reference) => {
                write!(f, "The reference '{}' does not resolve to a node", reference)
            }
        }
    }
}

impl std::error::Error for TraverserError {}

#[derive(Debug)]
pub struct OpenApiTraverser {
    specification: Value,
    // Previously resolved reference targets, keyed by reference string.
    resolved_references: DashMap<String, Arc<Value>>,
}

impl OpenApiTraverser {
    pub fn new(specification: Value) -> Self {
        Self { specification, resolved_references: DashMap::new() }
    }

    pub fn specification(&self) -> &Value {
        &self.specification
    }

    /// Looks up `field` on `node`, resolving a `$ref` on `node` first.
    /// A missing field is an error; use [`get_optional`] to tolerate it.
    ///
    /// [`get_optional`]: OpenApiTraverser::get_optional
    pub fn get_required<'node>(
        &'node self,
        node: &'node Value,
        field: &str,
    ) -> Result<SearchResult<'node>, TraverserError> {
        let resolved = self.resolve(node)?;
        match resolved {
            SearchResult::Arc(val) => match val.get(field) {
                None => Err(TraverserError::MissingField(field.to_string())),
                Some(v) => Ok(SearchResult::Arc(Arc::new(v.clone()))),
            },
            SearchResult::Ref(val) => match val.get(field) {
                None => Err(TraverserError::MissingField(field.to_string())),
                Some(v) => Ok(SearchResult::Ref(v)),
            },
        }
    }

    pub fn get_optional<'node>(
        &'node self,
        node: &'node Value,
        field: &str,
    ) -> Result<Option<SearchResult<'node>>, TraverserError> {
        match self.get_required(node, field) {
            Ok(found) => Ok(Some(found)),
            Err(TraverserError::MissingField(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolves `node` if it is a `{"$ref": …}` wrapper, memoizing the
    /// resolved target; plain nodes pass through untouched.
    pub fn resolve<'node>(&'node self, node: &'node Value) -> TraverseResult<'node> {
        if let Some(ref_string) = node.get(REF_FIELD).and_then(|v| v.as_str()) {
            if let Some(hit) = self.resolved_references.get(ref_string) {
                return Ok(SearchResult::Arc(Arc::clone(hit.value())));
            }
            let mut seen_references = HashSet::new();
            let resolved = self.follow_reference(ref_string, &mut seen_references)?;
            let resolved = resolved.to_arc();
            self.resolved_references.insert(ref_string.to_string(), Arc::clone(&resolved));
            return Ok(SearchResult::Arc(resolved));
        }
        Ok(SearchResult::Ref(node))
    }

    /// Follows a local reference string (`#/components/…`) to its target,
    /// chasing nested references and failing on cycles.
    fn follow_reference<'node>(
        &'node self,
        ref_string: &str,
        seen_references: &mut HashSet<String>,
    ) -> TraverseResult<'node> {
        if !seen_references.insert(ref_string.to_string()) {
            return Err(TraverserError::CircularReference(ref_string.to_string()));
        }
        let mut pointer = String::from(PATH_SEPARATOR);
        pointer.push_str(
            &ref_string
                .split(PATH_SEPARATOR)
                .filter(|segment| !segment.is_empty() && *segment != "#")
                .collect::<Vec<&str>>()
                .join(PATH_SEPARATOR),
        );

        let target = self
            .specification
            .pointer(&pointer)
            .ok_or_else(|| TraverserError::UnresolvedReference(ref_string.to_string()))?;

        if let Some(next_ref) = target.get(REF_FIELD).and_then(|v| v.as_str()) {
            return self.follow_reference(next_ref, seen_references);
        }
        Ok(SearchResult::Ref(target))
    }

    pub(crate) fn require_str(node: &Value) -> Result<&str, TraverserError> {
        node.as_str().ok_or_else(|| TraverserError::UnexpectedKind {
            expected: "string",
            found: node.to_string(),
        })
    }

    pub(crate) fn require_bool(node: &Value) -> Result<bool, TraverserError> {
        node.as_bool().ok_or_else(|| TraverserError::UnexpectedKind {
            expected: "boolean",
            found: node.to_string(),
        })
    }

    pub(crate) fn require_object(node: &Value) -> Result<&Map<String, Value>, TraverserError> {
        node.as_object().ok_or_else(|| TraverserError::UnexpectedKind {
            expected: "object",
            found: node.to_string(),
        })
    }

    pub(crate) fn require_array(node: &Value) -> Result<&Vec<Value>, TraverserError> {
        node.as_array().ok_or_else(|| TraverserError::UnexpectedKind {
            expected: "array",
            found: node.to_string(),
        })
    }
}
