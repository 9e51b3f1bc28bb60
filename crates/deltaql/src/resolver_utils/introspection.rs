//! Introspection: the `__schema` and `__type` entry points and the meta
//! types they resolve through.
//!
//! The meta types (`__Schema`, `__Type`, ...) are ordinary registry types
//! whose field resolvers walk the registry. Type references travel between
//! resolvers as small marker objects carrying the wrapped type string, so an
//! `ofType` chain of any depth resolves lazily; everything else (fields,
//! input values, enum values, directives) is materialized as plain objects
//! the default property resolver picks apart.

use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;

use crate::{
    context::ContextExt,
    registry::{
        resolvers::{FieldFuture, ResolverContext},
        EnumType, MetaDirective, MetaEnumValue, MetaField, MetaInputValue, MetaType, MetaTypeName,
        ObjectType, Registry,
    },
};

const TYPE_REF_KEY: &str = "__type_ref";

/// Field definitions for the reserved `__schema` and `__type` fields of the
/// query root.
#[derive(Debug)]
pub struct IntrospectionRoot {
    pub schema_field: MetaField,
    pub type_field: MetaField,
}

impl Default for IntrospectionRoot {
    fn default() -> Self {
        IntrospectionRoot {
            schema_field: MetaField::new("__schema", "__Schema!")
                .with_description("Access the current type schema of this server.")
                .resolve_with(|_ctx: ResolverContext<'_>| {
                    FieldFuture::from_value(ConstValue::Object(Default::default()))
                }),
            type_field: MetaField::new("__type", "__Type")
                .with_description("Request the type information of a single type.")
                .argument(MetaInputValue::new("name", "String!"))
                .resolve_with(|ctx: ResolverContext<'_>| {
                    let value = match ctx.arg("name") {
                        ConstValue::String(name) if ctx.ctx.registry().lookup_type(name).is_some() => {
                            type_ref(name)
                        }
                        _ => ConstValue::Null,
                    };
                    FieldFuture::from_value(value)
                }),
        }
    }
}

/// Register the introspection meta types. Idempotent.
pub(crate) fn install_introspection_types(registry: &mut Registry) {
    if registry.lookup_type("__Schema").is_some() {
        return;
    }

    registry.insert_type(schema_type());
    registry.insert_type(type_type());
    registry.insert_type(field_type());
    registry.insert_type(input_value_type());
    registry.insert_type(enum_value_type());
    registry.insert_type(directive_type());
    registry.insert_type(EnumType::new(
        "__TypeKind",
        [
            "SCALAR",
            "OBJECT",
            "INTERFACE",
            "UNION",
            "ENUM",
            "INPUT_OBJECT",
            "LIST",
            "NON_NULL",
        ]
        .map(MetaEnumValue::new),
    ));
    registry.insert_type(EnumType::new(
        "__DirectiveLocation",
        [
            "QUERY",
            "MUTATION",
            "SUBSCRIPTION",
            "FIELD",
            "FRAGMENT_DEFINITION",
            "FRAGMENT_SPREAD",
            "INLINE_FRAGMENT",
            "VARIABLE_DEFINITION",
            "SCHEMA",
            "SCALAR",
            "OBJECT",
            "FIELD_DEFINITION",
            "ARGUMENT_DEFINITION",
            "INTERFACE",
            "UNION",
            "ENUM",
            "ENUM_VALUE",
            "INPUT_OBJECT",
            "INPUT_FIELD_DEFINITION",
        ]
        .map(MetaEnumValue::new),
    ));
}

fn schema_type() -> ObjectType {
    ObjectType::new(
        "__Schema",
        [
            MetaField::new("description", "String")
                .resolve_with(|_: ResolverContext<'_>| FieldFuture::from_value(ConstValue::Null)),
            MetaField::new("types", "[__Type!]!")
                .with_description("A list of all types supported by this server.")
                .resolve_with(|ctx: ResolverContext<'_>| {
                    let types = ctx
                        .ctx
                        .registry()
                        .types
                        .keys()
                        .map(|name| type_ref(name))
                        .collect();
                    FieldFuture::from_value(ConstValue::List(types))
                }),
            MetaField::new("queryType", "__Type!")
                .with_description("The type that query operations will be rooted at.")
                .resolve_with(|ctx: ResolverContext<'_>| {
                    FieldFuture::from_value(type_ref(&ctx.ctx.registry().query_type))
                }),
            MetaField::new("mutationType", "__Type")
                .with_description(
                    "If this server supports mutation, the type that mutation operations will be rooted at.",
                )
                .resolve_with(|ctx: ResolverContext<'_>| {
                    FieldFuture::from_value(
                        ctx.ctx
                            .registry()
                            .mutation_type
                            .as_deref()
                            .map(type_ref)
                            .unwrap_or(ConstValue::Null),
                    )
                }),
            MetaField::new("subscriptionType", "__Type")
                .with_description(
                    "If this server supports subscription, the type that subscription operations will be rooted at.",
                )
                .resolve_with(|ctx: ResolverContext<'_>| {
                    FieldFuture::from_value(
                        ctx.ctx
                            .registry()
                            .subscription_type
                            .as_deref()
                            .map(type_ref)
                            .unwrap_or(ConstValue::Null),
                    )
                }),
            MetaField::new("directives", "[__Directive!]!")
                .with_description("A list of all directives supported by this server.")
                .resolve_with(|ctx: ResolverContext<'_>| {
                    let mut directives = ctx.ctx.registry().directives.values().collect::<Vec<_>>();
                    directives.sort_by(|a, b| a.name.cmp(&b.name));
                    FieldFuture::from_value(ConstValue::List(
                        directives.into_iter().map(directive_value).collect(),
                    ))
                }),
        ],
    )
    .with_description(
        "A GraphQL Schema defines the capabilities of a GraphQL server. It exposes all available types and directives on the server, as well as the entry points for query, mutation, and subscription operations.",
    )
}

fn type_type() -> ObjectType {
    ObjectType::new(
        "__Type",
        [
            MetaField::new("kind", "__TypeKind!").resolve_with(|ctx: ResolverContext<'_>| {
                let kind = with_type_ref(&ctx, |ctx, ty| match MetaTypeName::create(ty) {
                    MetaTypeName::NonNull(_) => ConstValue::String("NON_NULL".into()),
                    MetaTypeName::List(_) => ConstValue::String("LIST".into()),
                    MetaTypeName::Named(name) => ctx
                        .ctx
                        .registry()
                        .lookup_type(name)
                        .map(|meta| ConstValue::String(meta.kind().introspection_name().into()))
                        .unwrap_or(ConstValue::Null),
                });
                FieldFuture::from_value(kind)
            }),
            MetaField::new("name", "String").resolve_with(|ctx: ResolverContext<'_>| {
                let name = with_type_ref(&ctx, |_, ty| match MetaTypeName::create(ty) {
                    MetaTypeName::Named(name) => ConstValue::String(name.into()),
                    _ => ConstValue::Null,
                });
                FieldFuture::from_value(name)
            }),
            MetaField::new("description", "String").resolve_with(|ctx: ResolverContext<'_>| {
                let description = with_named_type(&ctx, |meta| {
                    meta.description()
                        .map(|description| ConstValue::String(description.into()))
                        .unwrap_or(ConstValue::Null)
                });
                FieldFuture::from_value(description)
            }),
            MetaField::new("specifiedByURL", "String").resolve_with(|ctx: ResolverContext<'_>| {
                let url = with_named_type(&ctx, |meta| match meta {
                    MetaType::Scalar(scalar) => scalar
                        .specified_by_url
                        .as_deref()
                        .map(|url| ConstValue::String(url.into()))
                        .unwrap_or(ConstValue::Null),
                    _ => ConstValue::Null,
                });
                FieldFuture::from_value(url)
            }),
            MetaField::new("fields", "[__Field!]")
                .argument(MetaInputValue::new("includeDeprecated", "Boolean").with_default(ConstValue::Boolean(false)))
                .resolve_with(|ctx: ResolverContext<'_>| {
                    let include_deprecated = matches!(ctx.arg("includeDeprecated"), ConstValue::Boolean(true));
                    let fields = with_named_type(&ctx, |meta| match meta.fields() {
                        Some(fields) => ConstValue::List(
                            fields
                                .values()
                                .filter(|field| include_deprecated || !field.deprecation.is_deprecated())
                                .map(field_value)
                                .collect(),
                        ),
                        None => ConstValue::Null,
                    });
                    FieldFuture::from_value(fields)
                }),
            MetaField::new("interfaces", "[__Type!]").resolve_with(|ctx: ResolverContext<'_>| {
                let interfaces = with_named_type(&ctx, |meta| match meta {
                    MetaType::Object(object) => {
                        ConstValue::List(object.implements.iter().map(|name| type_ref(name)).collect())
                    }
                    MetaType::Interface(_) => ConstValue::List(Vec::new()),
                    _ => ConstValue::Null,
                });
                FieldFuture::from_value(interfaces)
            }),
            MetaField::new("possibleTypes", "[__Type!]").resolve_with(|ctx: ResolverContext<'_>| {
                let possible = with_named_type(&ctx, |meta| match meta.possible_types() {
                    Some(possible) => {
                        ConstValue::List(possible.iter().map(|name| type_ref(name)).collect())
                    }
                    None => ConstValue::Null,
                });
                FieldFuture::from_value(possible)
            }),
            MetaField::new("enumValues", "[__EnumValue!]")
                .argument(MetaInputValue::new("includeDeprecated", "Boolean").with_default(ConstValue::Boolean(false)))
                .resolve_with(|ctx: ResolverContext<'_>| {
                    let include_deprecated = matches!(ctx.arg("includeDeprecated"), ConstValue::Boolean(true));
                    let values = with_named_type(&ctx, |meta| match meta {
                        MetaType::Enum(enum_type) => ConstValue::List(
                            enum_type
                                .enum_values
                                .values()
                                .filter(|value| include_deprecated || !value.deprecation.is_deprecated())
                                .map(enum_value_value)
                                .collect(),
                        ),
                        _ => ConstValue::Null,
                    });
                    FieldFuture::from_value(values)
                }),
            MetaField::new("inputFields", "[__InputValue!]").resolve_with(|ctx: ResolverContext<'_>| {
                let fields = with_named_type(&ctx, |meta| match meta {
                    MetaType::InputObject(input_object) => ConstValue::List(
                        input_object.input_fields.values().map(input_value_value).collect(),
                    ),
                    _ => ConstValue::Null,
                });
                FieldFuture::from_value(fields)
            }),
            MetaField::new("ofType", "__Type").resolve_with(|ctx: ResolverContext<'_>| {
                let of_type = with_type_ref(&ctx, |_, ty| match MetaTypeName::create(ty) {
                    MetaTypeName::NonNull(inner) | MetaTypeName::List(inner) => type_ref(inner),
                    MetaTypeName::Named(_) => ConstValue::Null,
                });
                FieldFuture::from_value(of_type)
            }),
        ],
    )
    .with_description(
        "The fundamental unit of any GraphQL Schema is the type. There are many kinds of types in GraphQL as represented by the `__TypeKind` enum.",
    )
}

fn field_type() -> ObjectType {
    ObjectType::new(
        "__Field",
        [
            MetaField::new("name", "String!"),
            MetaField::new("description", "String"),
            MetaField::new("args", "[__InputValue!]!"),
            MetaField::new("type", "__Type!"),
            MetaField::new("isDeprecated", "Boolean!"),
            MetaField::new("deprecationReason", "String"),
        ],
    )
    .with_description(
        "Object and Interface types are described by a list of Fields, each of which has a name, potentially a list of arguments, and a return type.",
    )
}

fn input_value_type() -> ObjectType {
    ObjectType::new(
        "__InputValue",
        [
            MetaField::new("name", "String!"),
            MetaField::new("description", "String"),
            MetaField::new("type", "__Type!"),
            MetaField::new("defaultValue", "String"),
        ],
    )
    .with_description(
        "Arguments provided to Fields or Directives and the input fields of an InputObject are represented as Input Values which describe their type and optionally a default value.",
    )
}

fn enum_value_type() -> ObjectType {
    ObjectType::new(
        "__EnumValue",
        [
            MetaField::new("name", "String!"),
            MetaField::new("description", "String"),
            MetaField::new("isDeprecated", "Boolean!"),
            MetaField::new("deprecationReason", "String"),
        ],
    )
    .with_description(
        "One possible value for a given Enum. Enum values are unique values, not a placeholder for a string or numeric value.",
    )
}

fn directive_type() -> ObjectType {
    ObjectType::new(
        "__Directive",
        [
            MetaField::new("name", "String!"),
            MetaField::new("description", "String"),
            MetaField::new("locations", "[__DirectiveLocation!]!"),
            MetaField::new("args", "[__InputValue!]!"),
            MetaField::new("isRepeatable", "Boolean!"),
        ],
    )
    .with_description(
        "A Directive provides a way to describe alternate runtime execution and type validation behavior in a GraphQL document.",
    )
}

/// A type-reference marker: the value `__Type` resolvers read the wrapped
/// type string from.
fn type_ref(ty: &str) -> ConstValue {
    object([(TYPE_REF_KEY, ConstValue::String(ty.into()))])
}

fn with_type_ref<F>(ctx: &ResolverContext<'_>, f: F) -> ConstValue
where
    F: FnOnce(&ResolverContext<'_>, &str) -> ConstValue,
{
    match ctx.parent_value {
        ConstValue::Object(obj) => match obj.get(TYPE_REF_KEY) {
            Some(ConstValue::String(ty)) => f(ctx, ty),
            _ => ConstValue::Null,
        },
        _ => ConstValue::Null,
    }
}

fn with_named_type<F>(ctx: &ResolverContext<'_>, f: F) -> ConstValue
where
    F: FnOnce(&MetaType) -> ConstValue,
{
    with_type_ref(ctx, |ctx, ty| match MetaTypeName::create(ty) {
        MetaTypeName::Named(name) => ctx
            .ctx
            .registry()
            .lookup_type(name)
            .map(f)
            .unwrap_or(ConstValue::Null),
        _ => ConstValue::Null,
    })
}

fn field_value(field: &MetaField) -> ConstValue {
    object([
        ("name", ConstValue::String(field.name.clone())),
        ("description", opt_string(field.description.as_deref())),
        (
            "args",
            ConstValue::List(field.args.values().map(input_value_value).collect()),
        ),
        ("type", type_ref(field.ty.as_str())),
        ("isDeprecated", ConstValue::Boolean(field.deprecation.is_deprecated())),
        ("deprecationReason", opt_string(field.deprecation.reason())),
    ])
}

fn input_value_value(input: &MetaInputValue) -> ConstValue {
    object([
        ("name", ConstValue::String(input.name.clone())),
        ("description", opt_string(input.description.as_deref())),
        ("type", type_ref(input.ty.as_str())),
        (
            "defaultValue",
            input
                .default_value
                .as_ref()
                .map(|value| ConstValue::String(value.to_string()))
                .unwrap_or(ConstValue::Null),
        ),
    ])
}

fn enum_value_value(value: &MetaEnumValue) -> ConstValue {
    object([
        ("name", ConstValue::String(value.name.clone())),
        ("description", opt_string(value.description.as_deref())),
        ("isDeprecated", ConstValue::Boolean(value.deprecation.is_deprecated())),
        ("deprecationReason", opt_string(value.deprecation.reason())),
    ])
}

fn directive_value(directive: &MetaDirective) -> ConstValue {
    object([
        ("name", ConstValue::String(directive.name.clone())),
        ("description", opt_string(directive.description.as_deref())),
        (
            "locations",
            ConstValue::List(
                directive
                    .locations
                    .iter()
                    .map(|location| ConstValue::String(location.as_str().into()))
                    .collect(),
            ),
        ),
        (
            "args",
            ConstValue::List(directive.args.values().map(input_value_value).collect()),
        ),
        ("isRepeatable", ConstValue::Boolean(directive.is_repeatable)),
    ])
}

fn opt_string(value: Option<&str>) -> ConstValue {
    value
        .map(|value| ConstValue::String(value.into()))
        .unwrap_or(ConstValue::Null)
}

fn object<'a>(entries: impl IntoIterator<Item = (&'a str, ConstValue)>) -> ConstValue {
    ConstValue::Object(
        entries
            .into_iter()
            .map(|(key, value)| (Name::new(key), value))
            .collect::<IndexMap<_, _>>(),
    )
}
