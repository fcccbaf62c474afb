//! Field projection through type descriptors.
//!
//! A [`TypeDescriptor`] belongs to the caller's domain model and names the
//! fields a returned document is allowed to carry. It is used only for
//! projecting results, never for query compilation.

use serde_json::Value;
use std::collections::HashMap;

/// Declared type of a projected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Scalar string. A single-element list is coerced to its element.
    Str,
    /// Numeric value.
    Num,
    /// Boolean value.
    Bool,
    /// Date/timestamp value.
    Date,
    /// List value.
    List,
    /// Nested object.
    Obj,
}

/// Projection rule for one field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Declared field type.
    pub kind: FieldKind,
    /// Private fields are stripped from projected documents.
    pub private: bool,
}

/// The caller-owned projection map: field name to declared type.
#[derive(Debug, Clone, Default)]
pub struct TypeDescriptor {
    fields: HashMap<String, FieldDescriptor>,
}

impl TypeDescriptor {
    /// Creates an empty descriptor (projects everything away).
    pub fn new() -> Self {
        TypeDescriptor::default()
    }

    /// Declares a public field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields
            .insert(name.into(), FieldDescriptor { kind, private: false });
        self
    }

    /// Declares a private field: kept in storage, stripped on return.
    pub fn private_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields
            .insert(name.into(), FieldDescriptor { kind, private: true });
        self
    }

    /// Projects a document in place.
    ///
    /// Fields absent from the descriptor or marked private are dropped. A
    /// one-element list under a field declared [`FieldKind::Str`] collapses
    /// to its scalar element. Non-object values pass through untouched.
    pub fn project(&self, document: &mut Value) {
        let Some(obj) = document.as_object_mut() else {
            return;
        };

        obj.retain(|key, _| {
            self.fields
                .get(key)
                .is_some_and(|desc| !desc.private)
        });

        for (key, value) in obj.iter_mut() {
            let Some(desc) = self.fields.get(key) else { continue };
            if desc.kind != FieldKind::Str {
                continue;
            }
            if let Value::Array(items) = value {
                if items.len() == 1 {
                    *value = items.remove(0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_descriptor() -> TypeDescriptor {
        TypeDescriptor::new()
            .field("id", FieldKind::Str)
            .field("name", FieldKind::Str)
            .field("tags", FieldKind::List)
            .private_field("password", FieldKind::Str)
    }

    #[test]
    fn undeclared_and_private_fields_are_dropped() {
        let mut doc = json!({
            "id": "user.1",
            "name": "Alice",
            "password": "secret",
            "_key": "abc",
            "_rev": "1",
        });
        user_descriptor().project(&mut doc);

        assert_eq!(doc, json!({ "id": "user.1", "name": "Alice" }));
    }

    #[test]
    fn single_element_list_collapses_for_string_fields() {
        let mut doc = json!({ "name": ["Alice"], "tags": ["a"] });
        user_descriptor().project(&mut doc);

        assert_eq!(doc["name"], json!("Alice"));
        // declared as a list, left alone
        assert_eq!(doc["tags"], json!(["a"]));
    }

    #[test]
    fn non_objects_pass_through() {
        let mut value = json!(42);
        user_descriptor().project(&mut value);
        assert_eq!(value, json!(42));
    }
}
