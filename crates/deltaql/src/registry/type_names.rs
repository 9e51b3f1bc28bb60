//! String wrappers and decomposition helpers for GraphQL type names.
//!
//! Type references in the registry are stored as the type strings of the
//! schema language (`User`, `[Int!]!`, ...). Completion peels them one
//! wrapper at a time with [`MetaTypeName::create`].

use std::fmt;

/// The type of a field, as it appears in the schema, including any list and
/// non-null wrappers.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct MetaFieldType(String);

impl MetaFieldType {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_non_null(&self) -> bool {
        self.0.ends_with('!')
    }

    pub fn is_nullable(&self) -> bool {
        !self.is_non_null()
    }
}

impl fmt::Display for MetaFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MetaFieldType {
    fn from(value: &str) -> MetaFieldType {
        MetaFieldType(value.to_string())
    }
}

impl From<String> for MetaFieldType {
    fn from(value: String) -> MetaFieldType {
        MetaFieldType(value)
    }
}

/// The type of an input value or variable, as written in the schema or the
/// operation document.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct InputValueType(String);

impl InputValueType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InputValueType {
    fn from(value: &str) -> InputValueType {
        InputValueType(value.to_string())
    }
}

impl From<String> for InputValueType {
    fn from(value: String) -> InputValueType {
        InputValueType(value)
    }
}

/// A decomposed view of a type string: its outermost wrapper, if any.
///
/// Value completion recurses through this one layer at a time, so only the
/// outermost wrapper is ever split off.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MetaTypeName<'a> {
    List(&'a str),
    NonNull(&'a str),
    Named(&'a str),
}

impl<'a> MetaTypeName<'a> {
    #[inline]
    pub fn create(type_name: &str) -> MetaTypeName {
        if let Some(inner) = type_name.strip_suffix('!') {
            MetaTypeName::NonNull(inner)
        } else if let Some(inner) = strip_brackets(type_name) {
            MetaTypeName::List(inner)
        } else {
            MetaTypeName::Named(type_name)
        }
    }

    /// The named type at the bottom of the wrapper stack.
    #[inline]
    pub fn concrete_typename(type_name: &str) -> &str {
        match MetaTypeName::create(type_name) {
            MetaTypeName::List(inner) | MetaTypeName::NonNull(inner) => {
                Self::concrete_typename(inner)
            }
            MetaTypeName::Named(name) => name,
        }
    }

    #[inline]
    pub fn is_non_null(&self) -> bool {
        matches!(self, MetaTypeName::NonNull(_))
    }

    #[inline]
    #[must_use]
    pub fn unwrap_non_null(&self) -> Self {
        match self {
            MetaTypeName::NonNull(inner) => MetaTypeName::create(inner),
            _ => *self,
        }
    }
}

fn strip_brackets(type_name: &str) -> Option<&str> {
    type_name
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_type_name() {
        assert_eq!(MetaTypeName::create("Int!"), MetaTypeName::NonNull("Int"));
        assert_eq!(MetaTypeName::create("[Int!]"), MetaTypeName::List("Int!"));
        assert_eq!(MetaTypeName::create("Int"), MetaTypeName::Named("Int"));
        assert_eq!(MetaTypeName::create("[Int!]!"), MetaTypeName::NonNull("[Int!]"));
        assert_eq!(MetaTypeName::concrete_typename("[[Int!]]!"), "Int");
        assert_eq!(
            MetaTypeName::create("[Int]!").unwrap_non_null(),
            MetaTypeName::List("Int")
        );
    }

    #[test]
    fn test_field_type_nullability() {
        assert!(MetaFieldType::from("Int!").is_non_null());
        assert!(MetaFieldType::from("[Int]!").is_non_null());
        assert!(MetaFieldType::from("[Int!]").is_nullable());
        assert!(MetaFieldType::from("Int").is_nullable());
    }
}
