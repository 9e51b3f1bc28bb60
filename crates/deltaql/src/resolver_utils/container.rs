//! Executing the grouped field set of a container type.

use std::future::Future;
use std::pin::Pin;

use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;

use super::{collect_fields, resolve_field, CollectedFields};
use crate::{
    context::{ContextExt, ContextField, ContextSelectionSet},
    deferred::{DeferredWorkload, WorkloadKind},
    registry::ObjectType,
    ServerError, ServerResult,
};

/// Resolve a container by executing each of its fields concurrently.
pub(crate) async fn resolve_container(
    ctx: &ContextSelectionSet<'_>,
    parent_value: &ConstValue,
) -> ServerResult<ConstValue> {
    let collected = collect_fields(ctx, &ctx.ty.name, [ctx.item])?;
    execute_fields(ctx, &collected, parent_value, true).await
}

/// Resolve a container by executing each of its fields serially.
pub(crate) async fn resolve_container_serial(
    ctx: &ContextSelectionSet<'_>,
    parent_value: &ConstValue,
) -> ServerResult<ConstValue> {
    let collected = collect_fields(ctx, &ctx.ty.name, [ctx.item])?;
    execute_fields(ctx, &collected, parent_value, false).await
}

/// Resolve the sub-selection of a field whose value completed to the concrete
/// object type `ty`, merging the selection sets of every field node grouped
/// under the response name.
///
/// `precollected` carries a grouped field set collected once for a whole list
/// of elements; when absent the selection sets are collected here.
pub(crate) async fn resolve_container_for_field(
    ctx_field: &ContextField<'_>,
    ty: &ObjectType,
    parent_value: &ConstValue,
    precollected: Option<&CollectedFields<'_>>,
) -> ServerResult<ConstValue> {
    let ctx = ContextSelectionSet {
        ty,
        path_node: ctx_field.path_node,
        item: &ctx_field.item.node.selection_set,
        schema_env: ctx_field.schema_env,
        query_env: ctx_field.query_env,
        scope: ctx_field.scope,
    };
    match precollected {
        Some(collected) => execute_fields(&ctx, collected, parent_value, true).await,
        None => {
            let collected = collect_fields(&ctx, &ty.name, ctx_field.selection_sets())?;
            execute_fields(&ctx, &collected, parent_value, true).await
        }
    }
}

type BoxFieldFuture<'a> = Pin<Box<dyn Future<Output = ServerResult<(Name, ConstValue)>> + Send + 'a>>;

/// Execute a collected field set against `parent_value`, concurrently or
/// serially, and assemble the response object in first-appearance order.
pub(crate) async fn execute_fields(
    ctx: &ContextSelectionSet<'_>,
    collected: &CollectedFields<'_>,
    parent_value: &ConstValue,
    parallel: bool,
) -> ServerResult<ConstValue> {
    register_deferred_patches(ctx, collected, parent_value)?;

    let mut futures = Vec::with_capacity(collected.grouped.len());
    for nodes in collected.grouped.values() {
        futures.push(field_future(ctx, nodes, parent_value)?);
    }

    let results = if parallel {
        futures_util::future::try_join_all(futures).await?
    } else {
        let mut results = Vec::with_capacity(futures.len());
        for future in futures {
            results.push(future.await?);
        }
        results
    };

    let mut map = IndexMap::new();
    for (name, value) in results {
        map.insert(name, value);
    }
    Ok(ConstValue::Object(map))
}

fn field_future<'a>(
    ctx: &'a ContextSelectionSet<'a>,
    nodes: &'a [&'a crate::Positioned<crate::parser::types::Field>],
    parent_value: &'a ConstValue,
) -> ServerResult<BoxFieldFuture<'a>> {
    let first = nodes[0];
    let field_name = first.node.name.node.as_str();
    let response_key = first.node.response_key().node.clone();

    if field_name == "__typename" {
        let type_name = ctx.ty.name.clone();
        return Ok(Box::pin(async move {
            Ok((response_key, ConstValue::String(type_name)))
        }));
    }

    // `__schema` and `__type` live on the query root only; their definitions
    // sit outside the root type so they never show up in introspection.
    let is_query_root = ctx.ty.name == ctx.registry().query_type;
    let meta_field = if is_query_root && field_name == "__schema" {
        introspection_field(ctx, &ctx.schema_env.introspection.schema_field, first)?
    } else if is_query_root && field_name == "__type" {
        introspection_field(ctx, &ctx.schema_env.introspection.type_field, first)?
    } else {
        ctx.ty.field_by_name(field_name).ok_or_else(|| {
            ServerError::new(
                format!(r#"Cannot query field "{field_name}" on type "{}"."#, ctx.ty.name),
                Some(first.node.name.pos),
            )
        })?
    };

    let ctx_field = ctx.with_field(nodes, meta_field);
    Ok(Box::pin(async move {
        let value = resolve_field(&ctx_field, parent_value).await?;
        Ok((response_key, value))
    }))
}

fn introspection_field<'a>(
    ctx: &ContextSelectionSet<'a>,
    field: &'a crate::registry::MetaField,
    node: &crate::Positioned<crate::parser::types::Field>,
) -> ServerResult<&'a crate::registry::MetaField> {
    if !ctx.query_env.introspection_enabled {
        return Err(ServerError::new(
            "Unauthorized for introspection.",
            Some(node.node.name.pos),
        ));
    }
    Ok(field)
}

/// Hand the `@defer`red patches of this container to the incremental-delivery
/// machinery. Patches execute under the same concrete type and parent value,
/// sequenced after the payload currently being built.
fn register_deferred_patches(
    ctx: &ContextSelectionSet<'_>,
    collected: &CollectedFields<'_>,
    parent_value: &ConstValue,
) -> ServerResult<()> {
    if collected.deferred.is_empty() {
        return Ok(());
    }
    let Some(sender) = ctx.deferred_workloads() else {
        // The collector only emits patches when a sender is present.
        return Ok(());
    };
    for patch in &collected.deferred {
        let workload = DeferredWorkload::new(
            patch.label.clone(),
            ctx.response_path(),
            WorkloadKind::Fragment {
                type_name: ctx.ty.name.clone(),
                selection_set: patch.selection_set.clone(),
                parent_value: parent_value.clone(),
            },
            ctx.scope.ordering.clone(),
        );
        sender
            .send(workload)
            .map_err(|error| ctx.set_error_path(error.into_server_error(patch.selection_set.pos)))?;
    }
    Ok(())
}
