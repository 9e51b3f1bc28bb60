//! Resolving a single field: argument coercion, resolver invocation and
//! type-directed value completion.

use async_graphql_value::{ConstValue, Name};
use async_recursion::async_recursion;
use indexmap::IndexMap;

use super::{
    input_value::resolve_input,
    list::{resolve_list, stream_directive},
    resolve_container_for_field, CollectedFields, StreamSpec,
};
use crate::{
    context::{ContextExt, ContextField},
    registry::{
        resolvers::{
            resolve_property, typename_property, ResolveInfo, ResolvedValue, ResolverContext,
            TypeResolutionContext,
        },
        MetaType, MetaTypeName, ObjectType,
    },
    ServerError, ServerResult,
};

/// Resolve the field of `ctx` against `parent_value`.
///
/// A failure of a nullable field is recorded here and the field nulls out; a
/// failure of a non-null field propagates to the parent, which either
/// records it or keeps propagating.
pub(crate) async fn resolve_field(
    ctx: &ContextField<'_>,
    parent_value: &ConstValue,
) -> ServerResult<ConstValue> {
    let result = resolve_field_value(ctx, parent_value)
        .await
        .map_err(|error| ctx.set_error_path(error));

    match result {
        Ok(value) => Ok(value),
        Err(error) if ctx.field.ty.is_nullable() => {
            ctx.add_error(error);
            Ok(ConstValue::Null)
        }
        Err(error) => {
            // Propagate the error to a parent that can record it and null
            // things out.
            Err(error)
        }
    }
}

async fn resolve_field_value(
    ctx: &ContextField<'_>,
    parent_value: &ConstValue,
) -> ServerResult<ConstValue> {
    let args = coerce_arguments(ctx)?;
    let stream = stream_directive(ctx)?;

    let resolver = ctx
        .field
        .resolver
        .as_ref()
        .or_else(|| ctx.query_env.field_resolver.as_ref());

    let resolved = match resolver {
        Some(resolver) => {
            let info = ResolveInfo {
                path_node: ctx
                    .path_node
                    .as_ref()
                    .expect("field contexts always carry a path"),
                parent_type: &ctx.parent_type.name,
                return_type: &ctx.field.ty,
                name: &ctx.field.name,
                alias: ctx.item.node.alias.as_ref().map(|alias| alias.node.as_str()),
            };
            resolver(ResolverContext {
                ctx,
                parent_value,
                args: &args,
                info,
            })
            .resolve()
            .await
        }
        None => Ok(ResolvedValue::Value(resolve_property(
            parent_value,
            ctx.field.target_field_name(),
        ))),
    }
    .map_err(|error| error.into_server_error(ctx.item.pos))?;

    complete_value(ctx, ctx.field.ty.as_str(), resolved, stream, None).await
}

/// Compute the argument values of the field from the primary field node,
/// resolving variable references and applying declared defaults.
fn coerce_arguments(ctx: &ContextField<'_>) -> ServerResult<IndexMap<Name, ConstValue>> {
    let mut args = IndexMap::with_capacity(ctx.field.args.len());
    for meta_input in ctx.field.args.values() {
        let value = match ctx.item.node.get_argument(&meta_input.name) {
            Some(value) => Some(ctx.resolve_input_value(value.clone())?),
            None => None,
        };
        if let Some(value) = resolve_input(ctx.registry(), ctx.item.pos, meta_input, value)
            .map_err(|error| ctx.set_error_path(error))?
        {
            args.insert(Name::new(&meta_input.name), value);
        }
    }
    Ok(args)
}

/// Complete a resolved value under the type `ty`, dispatching on the static
/// shape of the type: non-null and list wrappers first, then the named type.
///
/// `stream` is the active `@stream` of the outermost list, if any;
/// `precollected` is a grouped field set shared across the elements of a
/// list of one concrete object type.
#[async_recursion]
pub(crate) async fn complete_value(
    ctx: &ContextField<'_>,
    ty: &str,
    value: ResolvedValue,
    stream: Option<StreamSpec>,
    precollected: Option<&CollectedFields<'_>>,
) -> ServerResult<ConstValue> {
    match MetaTypeName::create(ty) {
        MetaTypeName::NonNull(inner) => {
            let completed = complete_value(ctx, inner, value, stream, precollected).await?;
            if matches!(completed, ConstValue::Null) {
                tracing::warn!(
                    parent_type = ctx.parent_type.name.as_str(),
                    field = ctx.field.name.as_str(),
                    "a non-null field resolved to null",
                );
                return Err(non_null_violation(ctx));
            }
            Ok(completed)
        }
        MetaTypeName::List(inner) => resolve_list(ctx, inner, value, stream).await,
        MetaTypeName::Named(name) => {
            let value = match value {
                ResolvedValue::Value(ConstValue::Null) => return Ok(ConstValue::Null),
                ResolvedValue::Stream(_) => {
                    return Err(ctx.set_error_path(ServerError::new(
                        format!(
                            r#"Cannot stream the non-list field "{}.{}"."#,
                            ctx.parent_type.name, ctx.field.name
                        ),
                        Some(ctx.item.pos),
                    )))
                }
                ResolvedValue::Value(value) => value,
            };
            let meta = ctx.registry().lookup_type(name).ok_or_else(|| {
                ctx.set_error_path(ServerError::new(
                    format!("Internal error: unknown type {name}"),
                    Some(ctx.item.pos),
                ))
            })?;
            match meta {
                MetaType::Scalar(_) | MetaType::Enum(_) => complete_leaf(ctx, meta, value),
                MetaType::Object(object) => complete_object(ctx, object, value, precollected).await,
                MetaType::Interface(_) | MetaType::Union(_) => complete_abstract(ctx, meta, value).await,
                MetaType::InputObject(_) => Err(ctx.set_error_path(ServerError::new(
                    format!("Internal error: input object {name} cannot be used as an output type"),
                    Some(ctx.item.pos),
                ))),
            }
        }
    }
}

fn non_null_violation(ctx: &ContextField<'_>) -> ServerError {
    ctx.set_error_path(ServerError::new(
        format!(
            "Cannot return null for non-nullable field {}.{}.",
            ctx.parent_type.name, ctx.field.name
        ),
        Some(ctx.item.pos),
    ))
}

/// Complete a scalar or enum value.
fn complete_leaf(ctx: &ContextField<'_>, meta: &MetaType, value: ConstValue) -> ServerResult<ConstValue> {
    match meta {
        MetaType::Scalar(scalar) => {
            if let Some(serialize) = &scalar.serialize {
                let serialized = serialize(value.clone())
                    .map_err(|error| ctx.set_error_path(error.into_server_error(ctx.item.pos)))?;
                if matches!(serialized, ConstValue::Null) {
                    return Err(ctx.set_error_path(ServerError::new(
                        format!(
                            "Expected `{}.serialize({})` to return a non-nullable value, returned: null",
                            scalar.name, value
                        ),
                        Some(ctx.item.pos),
                    )));
                }
                return Ok(serialized);
            }
            if let Some(is_valid) = scalar.is_valid {
                if !is_valid(&value) {
                    return Err(ctx.set_error_path(ServerError::new(
                        format!(r#"Invalid value for the scalar "{}": {}"#, scalar.name, value),
                        Some(ctx.item.pos),
                    )));
                }
            }
            Ok(value)
        }
        MetaType::Enum(enum_type) => {
            let name = match &value {
                ConstValue::Enum(name) => Some(name.as_str()),
                ConstValue::String(string) => Some(string.as_str()),
                _ => None,
            };
            match name {
                Some(name) if enum_type.value(name).is_some() => Ok(ConstValue::Enum(Name::new(name))),
                _ => Err(ctx.set_error_path(ServerError::new(
                    format!(r#"Enum "{}" cannot represent value: {}"#, enum_type.name, value),
                    Some(ctx.item.pos),
                ))),
            }
        }
        _ => Err(ctx.set_error_path(ServerError::new(
            "Internal error: expected an enum or scalar type for a leaf value",
            Some(ctx.item.pos),
        ))),
    }
}

/// Complete a value of an abstract type: resolve the concrete runtime type,
/// check it against the possible types, then complete as that object.
async fn complete_abstract(
    ctx: &ContextField<'_>,
    meta: &MetaType,
    value: ConstValue,
) -> ServerResult<ConstValue> {
    let abstract_name = meta.name();

    let resolver = meta
        .resolve_type_fn()
        .cloned()
        .or_else(|| ctx.query_env.type_resolver.clone());
    let resolved = match resolver {
        Some(resolve_type) => resolve_type(TypeResolutionContext {
            ctx,
            value: &value,
            abstract_type: abstract_name,
        })
        .await
        .map_err(|error| ctx.set_error_path(error.into_server_error(ctx.item.pos)))?,
        None => default_resolve_type(ctx, meta, &value).await,
    };

    let Some(type_name) = resolved else {
        return Err(ctx.set_error_path(ServerError::new(
            format!(
                r#"Abstract type "{abstract_name}" must resolve to an Object type at runtime for field "{}.{}". Either the "{abstract_name}" type should provide a "resolve_type" function or each possible type should provide an "is_type_of" function."#,
                ctx.parent_type.name, ctx.field.name
            ),
            Some(ctx.item.pos),
        )));
    };

    let Some(runtime_type) = ctx.registry().lookup_type(&type_name) else {
        return Err(ctx.set_error_path(ServerError::new(
            format!(
                r#"Abstract type "{abstract_name}" was resolved to a type "{type_name}" that does not exist inside the schema."#
            ),
            Some(ctx.item.pos),
        )));
    };
    let Some(object) = runtime_type.object() else {
        return Err(ctx.set_error_path(ServerError::new(
            format!(r#"Abstract type "{abstract_name}" was resolved to a non-object type "{type_name}"."#),
            Some(ctx.item.pos),
        )));
    };
    if !ctx.registry().is_possible_type(abstract_name, &object.name) {
        return Err(ctx.set_error_path(ServerError::new(
            format!(r#"Runtime Object type "{}" is not a possible type for "{abstract_name}"."#, object.name),
            Some(ctx.item.pos),
        )));
    }

    complete_object(ctx, object, value, None).await
}

/// The default type resolver: the `__typename` property when present, else
/// the first possible type whose `is_type_of` accepts the value, in
/// declaration order.
async fn default_resolve_type(
    ctx: &ContextField<'_>,
    meta: &MetaType,
    value: &ConstValue,
) -> Option<String> {
    if let Some(name) = typename_property(value) {
        return Some(name.to_string());
    }
    if let Some(possible_types) = meta.possible_types() {
        for name in possible_types {
            if let Some(MetaType::Object(object)) = ctx.registry().lookup_type(name) {
                if let Some(is_type_of) = &object.is_type_of {
                    if is_type_of(value).await {
                        return Some(name.clone());
                    }
                }
            }
        }
    }
    None
}

/// Complete a value of a concrete object type by executing its sub-selection.
async fn complete_object(
    ctx: &ContextField<'_>,
    object: &ObjectType,
    value: ConstValue,
    precollected: Option<&CollectedFields<'_>>,
) -> ServerResult<ConstValue> {
    if let Some(is_type_of) = &object.is_type_of {
        if !is_type_of(&value).await {
            return Err(ctx.set_error_path(ServerError::new(
                format!(r#"Expected value of type "{}" but got: {}."#, object.name, value),
                Some(ctx.item.pos),
            )));
        }
    }
    resolve_container_for_field(ctx, object, &value, precollected).await
}
