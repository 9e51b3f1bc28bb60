//! Coercion of input values: field arguments and variable values.

use std::borrow::{Borrow, Cow};

use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;

use crate::{
    registry::{MetaInputValue, MetaType, MetaTypeName, Registry},
    Error, Pos, ServerResult,
};

/// Coerce an input value against the declared type of `meta_input_value`.
///
/// A missing value falls back to the declared default; a missing value for a
/// non-null type is an error. Returns `None` when the value is legitimately
/// absent.
pub(crate) fn resolve_input(
    registry: &Registry,
    error_pos: Pos,
    meta_input_value: &MetaInputValue,
    value: Option<ConstValue>,
) -> ServerResult<Option<ConstValue>> {
    let ty = meta_input_value.ty.to_string();
    resolve_maybe_absent_input(
        ResolveContext {
            registry,
            path: PathNode::new(&meta_input_value.name),
            ty: Cow::Borrowed(&ty),
            allow_list_coercion: true,
            default_value: meta_input_value.default_value.as_ref(),
        },
        value,
    )
    .map_err(|err| err.into_server_error(error_pos))
}

/// Chain of input-value names leading to the value being coerced, for error
/// reporting.
#[derive(Clone, Copy)]
struct PathNode<'a> {
    name: &'a str,
    previous: Option<&'a PathNode<'a>>,
}

impl<'a> PathNode<'a> {
    fn new(name: &'a str) -> PathNode<'a> {
        PathNode { name, previous: None }
    }

    fn with(&'a self, name: &'a str) -> PathNode<'a> {
        PathNode {
            name,
            previous: Some(self),
        }
    }

    fn into_vec(&self) -> Vec<String> {
        let mut previous = self.previous.map(PathNode::into_vec).unwrap_or_default();
        previous.push(self.name.to_string());
        previous
    }
}

#[derive(Clone)]
struct ResolveContext<'a> {
    registry: &'a Registry,
    path: PathNode<'a>,
    /// Expected GraphQL type.
    ty: Cow<'a, str>,
    /// Whether we allow list coercion at this point:
    /// <https://spec.graphql.org/October2021/#sec-List.Input-Coercion>
    /// Most of the time this will be true except for:
    /// ty: `[[Int]]`  value: `[1, 2, 3]` => Error: Incorrect item value
    allow_list_coercion: bool,
    default_value: Option<&'a ConstValue>,
}

impl<'a> ResolveContext<'a> {
    fn with_input(&'a self, path: &'a str, input: &'a MetaInputValue) -> ResolveContext<'a> {
        ResolveContext {
            registry: self.registry,
            path: self.path.with(path),
            ty: Cow::Borrowed(input.ty.as_str()),
            allow_list_coercion: true,
            default_value: input.default_value.as_ref(),
        }
    }

    fn input_error(self, expected: &str) -> Error {
        Error::new(format!("{expected} for {}", self.path.into_vec().join(".")))
    }
}

fn resolve_maybe_absent_input(
    rctx: ResolveContext<'_>,
    value: Option<ConstValue>,
) -> Result<Option<ConstValue>, Error> {
    match value.or_else(|| rctx.default_value.cloned()) {
        Some(value) => resolve_present_input(rctx, value).map(Some),
        None => matches!(MetaTypeName::create(rctx.ty.borrow()), MetaTypeName::NonNull(_))
            .then_some(Err(rctx.input_error("Unexpected null value")))
            .transpose(),
    }
}

fn resolve_present_input(rctx: ResolveContext<'_>, value: ConstValue) -> Result<ConstValue, Error> {
    match MetaTypeName::create(rctx.ty.borrow()) {
        MetaTypeName::NonNull(type_name) => {
            if matches!(value, ConstValue::Null) {
                return Err(rctx.input_error("Unexpected null value"));
            }
            resolve_present_input(
                ResolveContext {
                    ty: Cow::Borrowed(type_name),
                    ..rctx
                },
                value,
            )
        }
        MetaTypeName::List(type_name) => {
            if matches!(value, ConstValue::Null) {
                return Ok(value);
            }
            if let ConstValue::List(list) = value {
                let rctx = ResolveContext {
                    ty: Cow::Borrowed(type_name),
                    allow_list_coercion: list.len() <= 1,
                    default_value: None,
                    ..rctx
                };
                let mut arr = Vec::new();
                for (idx, element) in list.into_iter().enumerate() {
                    let path = idx.to_string();
                    let rctx = ResolveContext {
                        path: rctx.path.with(&path),
                        ..rctx.clone()
                    };
                    arr.push(resolve_present_input(rctx, element)?);
                }
                Ok(ConstValue::List(arr))
            } else if rctx.allow_list_coercion {
                Ok(ConstValue::List(vec![resolve_present_input(
                    ResolveContext {
                        ty: Cow::Borrowed(type_name),
                        allow_list_coercion: true,
                        default_value: None,
                        ..rctx
                    },
                    value,
                )?]))
            } else {
                Err(rctx.input_error("Expected a List"))
            }
        }
        MetaTypeName::Named(type_name) => {
            if matches!(value, ConstValue::Null) {
                return Ok(value);
            }
            match rctx.registry.lookup_type(type_name) {
                Some(MetaType::InputObject(input_object)) => {
                    if let ConstValue::Object(mut fields) = value {
                        let mut map = IndexMap::with_capacity(fields.len());
                        for meta_input_value in input_object.input_fields.values() {
                            if let Some(field_value) = resolve_maybe_absent_input(
                                rctx.with_input(&meta_input_value.name, meta_input_value),
                                fields.shift_remove(&Name::new(&meta_input_value.name)),
                            )? {
                                map.insert(Name::new(&meta_input_value.name), field_value);
                            }
                        }
                        Ok(ConstValue::Object(map))
                    } else {
                        Err(rctx.input_error("Expected an Object"))
                    }
                }
                Some(MetaType::Enum(enum_type)) => {
                    let str_value = match &value {
                        ConstValue::Enum(name) => name.as_str(),
                        ConstValue::String(string) => string.as_str(),
                        _ => {
                            return Err(rctx.input_error(&format!("Expected an enum, not a {}", kind_str(&value))))
                        }
                    };
                    if enum_type.value(str_value).is_none() {
                        return Err(rctx.input_error(&format!("Unknown enum value: {str_value}")));
                    }
                    Ok(ConstValue::Enum(Name::new(str_value)))
                }
                Some(MetaType::Scalar(scalar)) => {
                    if let Some(is_valid) = scalar.is_valid {
                        if !is_valid(&value) {
                            return Err(rctx.clone().input_error(&format!("Invalid {type_name} value")));
                        }
                    }
                    Ok(value)
                }
                _ => Err(rctx
                    .clone()
                    .input_error(&format!("Internal Error: Unsupported input type {type_name}"))),
            }
        }
    }
}

fn kind_str(value: &ConstValue) -> &'static str {
    match value {
        ConstValue::Null => "null",
        ConstValue::Number(_) => "number",
        ConstValue::String(_) => "string",
        ConstValue::Boolean(_) => "boolean",
        ConstValue::Binary(_) => "binary",
        ConstValue::Enum(_) => "enum",
        ConstValue::List(_) => "list",
        ConstValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EnumType, InputObjectType, MetaEnumValue};
    use async_graphql_value::value;

    fn registry() -> Registry {
        let mut registry = crate::schema::registry_with_builtin_scalars(Registry::new());
        registry.insert_type(EnumType::new(
            "Color",
            [MetaEnumValue::new("RED"), MetaEnumValue::new("GREEN")],
        ));
        registry.insert_type(InputObjectType::new(
            "Filter",
            [
                MetaInputValue::new("color", "Color!"),
                MetaInputValue::new("limit", "Int").with_default(value!(10)),
            ],
        ));
        registry
    }

    fn coerce(ty: &str, value: Option<ConstValue>) -> ServerResult<Option<ConstValue>> {
        resolve_input(
            &registry(),
            Pos::default(),
            &MetaInputValue::new("arg", ty),
            value,
        )
    }

    #[test]
    fn missing_non_null_is_an_error() {
        let err = coerce("Int!", None).unwrap_err();
        assert_eq!(err.message, "Unexpected null value for arg");
    }

    #[test]
    fn single_values_coerce_to_lists() {
        assert_eq!(coerce("[Int]", Some(value!(3))).unwrap(), Some(value!([3])));
        assert_eq!(
            coerce("[Int]", Some(value!([1, 2]))).unwrap(),
            Some(value!([1, 2]))
        );
    }

    #[test]
    fn input_object_defaults_are_applied() {
        let coerced = coerce("Filter", Some(value!({ "color": "RED" }))).unwrap().unwrap();
        assert_eq!(
            coerced,
            ConstValue::Object(
                [
                    (Name::new("color"), ConstValue::Enum(Name::new("RED"))),
                    (Name::new("limit"), value!(10)),
                ]
                .into_iter()
                .collect()
            )
        );
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let err = coerce("Color", Some(value!("BLUE"))).unwrap_err();
        assert_eq!(err.message, "Unknown enum value: BLUE for arg");
    }

    #[test]
    fn nested_list_items_are_path_tracked() {
        let err = coerce("[Int!]", Some(value!([1, null]))).unwrap_err();
        assert_eq!(err.message, "Unexpected null value for arg.1");
    }
}
