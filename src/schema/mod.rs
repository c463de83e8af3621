//! Structural payload types.
//!
//! Every `Single` step declares the shape of the value it transfers as a
//! [`PayloadType`] tree. Trees are parsed once, when a protocol is
//! decoded, and all validation happens on the tree; the wire text is
//! never re-inspected after that point.
//!
//! # Wire grammar
//!
//! Payload types use an object-literal text form tagged by a `type`
//! field:
//!
//! ```text
//! { type: "number" }
//! { type: "array", payload: { type: "number" } }
//! { type: "tuple", payload: [{ type: "number" }, { type: "string" }] }
//! { type: "union", payload: [{ type: "null" }, { type: "bool" }] }
//! { type: "record", payload: [{ type: "string" }, { type: "number" }] }
//! { type: "def", name: { type: "string" }, payload: { type: "number" } }
//! ```
//!
//! A `record` carries its field types positionally; field names are
//! taken from the transmitted value at validation time. A `def` wraps a
//! single-key object; its `name` position declares the type of the key,
//! which on this wire is always a string.

mod parser;
mod validate;

pub use parser::parse_type;
pub(crate) use parser::parse_type_prefix;
pub use validate::{check_transfer, declared_types_match, validate};

/// A recursive structural type descriptor for one payload transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadType {
    /// Any JSON number.
    Number,
    /// A JSON string.
    Str,
    /// A JSON boolean.
    Bool,
    /// JSON null.
    Null,
    /// Any of null, string, boolean, number, or array of anything.
    Any,
    /// Homogeneous sequence of the element type.
    Array(Box<PayloadType>),
    /// Fixed-length sequence, one type per position.
    Tuple(Vec<PayloadType>),
    /// Value must match at least one option, tried in order.
    Union(Vec<PayloadType>),
    /// Keyed structure; field types are positional, names come from the
    /// transmitted value.
    Record(Vec<PayloadType>),
    /// Single-key wrapper object around one payload.
    Def {
        /// Declared type of the wrapping key. Kept for the wire format;
        /// validation takes the actual key from the value.
        name: Box<PayloadType>,
        /// Type of the wrapped value.
        payload: Box<PayloadType>,
    },
}

impl PayloadType {
    /// The tag keyword of this type in the wire text.
    pub fn tag(&self) -> &'static str {
        match self {
            PayloadType::Number => "number",
            PayloadType::Str => "string",
            PayloadType::Bool => "bool",
            PayloadType::Null => "null",
            PayloadType::Any => "any",
            PayloadType::Array(_) => "array",
            PayloadType::Tuple(_) => "tuple",
            PayloadType::Union(_) => "union",
            PayloadType::Record(_) => "record",
            PayloadType::Def { .. } => "def",
        }
    }
}

fn write_list(f: &mut std::fmt::Formatter<'_>, items: &[PayloadType]) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

impl std::fmt::Display for PayloadType {
    /// Canonical wire text. `parse_type(t.to_string()) == t` for every
    /// tree.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadType::Number
            | PayloadType::Str
            | PayloadType::Bool
            | PayloadType::Null
            | PayloadType::Any => write!(f, "{{ type: \"{}\" }}", self.tag()),
            PayloadType::Array(elem) => {
                write!(f, "{{ type: \"array\", payload: {elem} }}")
            }
            PayloadType::Tuple(items) | PayloadType::Union(items) | PayloadType::Record(items) => {
                write!(f, "{{ type: \"{}\", payload: ", self.tag())?;
                write_list(f, items)?;
                write!(f, " }}")
            }
            PayloadType::Def { name, payload } => {
                write!(f, "{{ type: \"def\", name: {name}, payload: {payload} }}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_text_primitives() {
        assert_eq!(PayloadType::Number.to_string(), r#"{ type: "number" }"#);
        assert_eq!(PayloadType::Str.to_string(), r#"{ type: "string" }"#);
        assert_eq!(PayloadType::Any.to_string(), r#"{ type: "any" }"#);
    }

    #[test]
    fn test_canonical_text_nested() {
        let ty = PayloadType::Array(Box::new(PayloadType::Number));
        assert_eq!(
            ty.to_string(),
            r#"{ type: "array", payload: { type: "number" } }"#
        );

        let ty = PayloadType::Tuple(vec![PayloadType::Number, PayloadType::Str]);
        assert_eq!(
            ty.to_string(),
            r#"{ type: "tuple", payload: [{ type: "number" }, { type: "string" }] }"#
        );
    }

    #[test]
    fn test_canonical_text_def() {
        let ty = PayloadType::Def {
            name: Box::new(PayloadType::Str),
            payload: Box::new(PayloadType::Bool),
        };
        assert_eq!(
            ty.to_string(),
            r#"{ type: "def", name: { type: "string" }, payload: { type: "bool" } }"#
        );
    }
}
