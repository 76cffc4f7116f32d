//! Store-response descriptor
//!
//! The provider's store operation returns a JSON structure whose shape is
//! not contractually stable. Two shapes have been observed in the wild: a
//! flat dictionary with a direct handle field, and a nested dictionary with
//! a list of child node dictionaries each carrying a handle and a key
//! field. Everything else is kept as `Unrecognized` so the link-derivation
//! chain can match on it exhaustively instead of probing fields ad hoc at
//! each call site.

use serde::Deserialize;
use serde_json::Value;

/// A flat descriptor: the handle (and optionally the combined key) at the
/// top level.
#[derive(Debug, Clone, Deserialize)]
pub struct FlatNode {
    pub h: String,
    #[serde(default)]
    pub k: Option<String>,
}

/// A nested descriptor: a list-valued `f` field of child nodes. Children
/// are raw values because the provider does not guarantee they are
/// dictionary-shaped.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeList {
    pub f: Vec<Value>,
}

/// Provider response from the store operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoreDescriptor {
    Flat(FlatNode),
    Nested(NodeList),
    Unrecognized(Value),
}

impl StoreDescriptor {
    /// Node handle for the stored object, when the descriptor carries one
    /// in a recognized position.
    pub fn handle(&self) -> Option<&str> {
        match self {
            StoreDescriptor::Flat(node) => Some(node.h.as_str()),
            StoreDescriptor::Nested(list) => first_child_str(list, "h"),
            StoreDescriptor::Unrecognized(_) => None,
        }
    }

    /// Combined key field (`ownerId:key`), when the provider includes one.
    pub fn combined_key(&self) -> Option<&str> {
        match self {
            StoreDescriptor::Flat(node) => node.k.as_deref(),
            StoreDescriptor::Nested(list) => first_child_str(list, "k"),
            StoreDescriptor::Unrecognized(_) => None,
        }
    }
}

impl From<Value> for StoreDescriptor {
    fn from(value: Value) -> Self {
        // The untagged enum has a catch-all arm, so deserialization cannot
        // fail; the fallback keeps the conversion total anyway.
        serde_json::from_value(value.clone()).unwrap_or(StoreDescriptor::Unrecognized(value))
    }
}

fn first_child_str<'a>(list: &'a NodeList, field: &str) -> Option<&'a str> {
    list.f
        .first()
        .and_then(|child| child.as_object())
        .and_then(|obj| obj.get(field))
        .and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_descriptor_exposes_handle_and_key() {
        let descriptor = StoreDescriptor::from(json!({"h": "abc123", "k": "owner:key456"}));
        assert!(matches!(descriptor, StoreDescriptor::Flat(_)));
        assert_eq!(descriptor.handle(), Some("abc123"));
        assert_eq!(descriptor.combined_key(), Some("owner:key456"));
    }

    #[test]
    fn nested_descriptor_reads_first_child() {
        let descriptor = StoreDescriptor::from(json!({
            "f": [
                {"h": "node1", "k": "owner:key1", "s": 42},
                {"h": "node2"}
            ]
        }));
        assert!(matches!(descriptor, StoreDescriptor::Nested(_)));
        assert_eq!(descriptor.handle(), Some("node1"));
        assert_eq!(descriptor.combined_key(), Some("owner:key1"));
    }

    #[test]
    fn nested_descriptor_with_non_dict_child_has_no_handle() {
        let descriptor = StoreDescriptor::from(json!({"f": [7, {"h": "node2"}]}));
        assert!(matches!(descriptor, StoreDescriptor::Nested(_)));
        assert_eq!(descriptor.handle(), None);
        assert_eq!(descriptor.combined_key(), None);
    }

    #[test]
    fn nested_descriptor_with_empty_list_has_no_handle() {
        let descriptor = StoreDescriptor::from(json!({"f": []}));
        assert_eq!(descriptor.handle(), None);
    }

    #[test]
    fn unrecognized_shapes_yield_nothing() {
        for value in [json!({"x": 1}), json!([1, 2, 3]), json!(-9), json!(null)] {
            let descriptor = StoreDescriptor::from(value);
            assert!(matches!(descriptor, StoreDescriptor::Unrecognized(_)));
            assert_eq!(descriptor.handle(), None);
            assert_eq!(descriptor.combined_key(), None);
        }
    }

    #[test]
    fn flat_without_key_still_has_handle() {
        let descriptor = StoreDescriptor::from(json!({"h": "only-handle"}));
        assert_eq!(descriptor.handle(), Some("only-handle"));
        assert_eq!(descriptor.combined_key(), None);
    }
}
