//! List completion, including `@stream` scheduling.
//!
//! A list value is either a fully materialized `ConstValue::List` or a
//! [`ValueStream`] pulled item by item. Under an active `@stream`, items up
//! to `initialCount` complete into the initial payload and the tail becomes
//! deferred workloads: one per remaining item of a materialized list, or a
//! single driver workload for a stream source.

use async_graphql_value::ConstValue;
use futures_util::StreamExt;

use super::{collect_fields, complete_value, CollectedFields};
use crate::{
    context::{ContextExt, ContextField},
    deferred::{DeferredWorkload, WorkloadKind},
    query_path::{QueryPathNode, QueryPathSegment},
    registry::{resolvers::{ResolvedValue, ValueStream}, MetaType, MetaTypeName},
    PathSegment, ServerError, ServerResult,
};

/// An active `@stream` directive on a field.
#[derive(Debug, Clone)]
pub(crate) struct StreamSpec {
    pub initial_count: usize,
    pub label: Option<String>,
}

/// Parse the `@stream` directive of the field, when the surface supports
/// incremental delivery and the directive is not disabled with `if: false`.
pub(crate) fn stream_directive(ctx: &ContextField<'_>) -> ServerResult<Option<StreamSpec>> {
    if ctx.query_env.deferred_workloads.is_none() {
        return Ok(None);
    }
    let Some(directive) = ctx
        .item
        .node
        .directives
        .iter()
        .find(|directive| directive.node.name.node == "stream")
    else {
        return Ok(None);
    };

    if let Some(condition) = directive.node.get_argument("if") {
        if !matches!(
            ctx.resolve_input_value(condition.clone())?,
            ConstValue::Boolean(true)
        ) {
            return Ok(None);
        }
    }

    let initial_count = match directive.node.get_argument("initialCount") {
        Some(value) => match ctx.resolve_input_value(value.clone())? {
            ConstValue::Number(number) => number.as_u64().ok_or_else(|| {
                ServerError::new(
                    "The @stream initialCount must be a non-negative integer",
                    Some(directive.pos),
                )
            })? as usize,
            ConstValue::Null => 0,
            _ => {
                return Err(ServerError::new(
                    "The @stream initialCount must be a non-negative integer",
                    Some(directive.pos),
                ))
            }
        },
        None => 0,
    };

    let label = match directive.node.get_argument("label") {
        Some(value) => match ctx.resolve_input_value(value.clone())? {
            ConstValue::String(label) => Some(label),
            ConstValue::Null => None,
            _ => {
                return Err(ServerError::new(
                    "The @stream label must be a string",
                    Some(directive.pos),
                ))
            }
        },
        None => None,
    };

    Ok(Some(StreamSpec { initial_count, label }))
}

/// Complete a list value, each element under `inner_ty`.
pub(crate) async fn resolve_list(
    ctx: &ContextField<'_>,
    inner_ty: &str,
    value: ResolvedValue,
    stream: Option<StreamSpec>,
) -> ServerResult<ConstValue> {
    match value {
        ResolvedValue::Value(ConstValue::Null) => Ok(ConstValue::Null),
        ResolvedValue::Value(ConstValue::List(items)) => {
            resolve_list_items(ctx, inner_ty, items, stream).await
        }
        ResolvedValue::Value(_) => Err(ctx.set_error_path(ServerError::new(
            format!(
                r#"Expected Iterable, but did not find one for field "{}.{}"."#,
                ctx.parent_type.name, ctx.field.name
            ),
            Some(ctx.item.pos),
        ))),
        ResolvedValue::Stream(source) => resolve_stream_items(ctx, inner_ty, source, stream).await,
    }
}

async fn resolve_list_items(
    ctx: &ContextField<'_>,
    inner_ty: &str,
    items: Vec<ConstValue>,
    stream: Option<StreamSpec>,
) -> ServerResult<ConstValue> {
    let (items, rest) = match &stream {
        Some(spec) if items.len() > spec.initial_count => {
            let mut items = items;
            let rest = items.split_off(spec.initial_count);
            (items, rest)
        }
        _ => (items, Vec::new()),
    };

    let precollected = precollect_element_fields(ctx, inner_ty)?;
    let item_non_null = MetaTypeName::create(inner_ty).is_non_null();

    let futures = items.into_iter().enumerate().map(|(idx, item)| {
        let precollected = precollected.as_ref();
        async move {
            let path_node = QueryPathNode {
                parent: ctx.path_node.as_ref(),
                segment: QueryPathSegment::Index(idx),
                type_name: None,
            };
            let ctx_idx = ContextField {
                path_node: Some(path_node),
                ..ctx.clone()
            };
            complete_value(&ctx_idx, inner_ty, ResolvedValue::Value(item), None, precollected).await
        }
    });

    let mut children = Vec::new();
    for result in futures_util::future::join_all(futures).await {
        // Validate the nullability of each list item: a failed nullable item
        // nulls out in place, a failed non-null item fails the whole list.
        match result {
            Ok(value) => children.push(value),
            Err(error) if !item_non_null => {
                ctx.add_error(error);
                children.push(ConstValue::Null);
            }
            Err(error) => return Err(error),
        }
    }

    if !rest.is_empty() {
        let spec = stream.expect("a list tail only exists under an active @stream");
        register_list_tail(ctx, inner_ty, &spec, children.len(), rest)?;
    }

    Ok(ConstValue::List(children))
}

async fn resolve_stream_items(
    ctx: &ContextField<'_>,
    inner_ty: &str,
    mut source: ValueStream,
    stream: Option<StreamSpec>,
) -> ServerResult<ConstValue> {
    let Some(spec) = stream else {
        // This surface doesn't stream: drain the source into a plain list.
        let mut items = Vec::new();
        while let Some(item) = source.next().await {
            items.push(
                item.map_err(|error| {
                    ctx.set_error_path(error.into_server_error(ctx.item.pos))
                })?,
            );
        }
        return resolve_list_items(ctx, inner_ty, items, None).await;
    };

    let mut prefix = Vec::new();
    let mut exhausted = false;
    for _ in 0..spec.initial_count {
        match source.next().await {
            Some(Ok(item)) => prefix.push(item),
            Some(Err(error)) => {
                return Err(ctx.set_error_path(error.into_server_error(ctx.item.pos)))
            }
            None => {
                exhausted = true;
                break;
            }
        }
    }

    let initial_len = prefix.len();
    let completed = resolve_list_items(ctx, inner_ty, prefix, None).await?;

    if !exhausted {
        if let Some(sender) = ctx.deferred_workloads() {
            let workload = DeferredWorkload::new(
                spec.label.clone(),
                ctx.response_path(),
                WorkloadKind::StreamDriver {
                    parent_type_name: ctx.parent_type.name.clone(),
                    field_nodes: ctx.nodes.iter().map(|node| (*node).clone()).collect(),
                    item_type: inner_ty.into(),
                    stream: source,
                    index: initial_len,
                },
                ctx.scope.ordering.clone(),
            );
            sender
                .send(workload)
                .map_err(|error| ctx.set_error_path(error.into_server_error(ctx.item.pos)))?;
        }
    }

    Ok(completed)
}

/// Register one workload per remaining item of a materialized list, chained
/// so their payloads come out in index order.
fn register_list_tail(
    ctx: &ContextField<'_>,
    inner_ty: &str,
    spec: &StreamSpec,
    first_index: usize,
    rest: Vec<ConstValue>,
) -> ServerResult<()> {
    let Some(sender) = ctx.deferred_workloads() else {
        return Ok(());
    };
    let mut after = ctx.scope.ordering.clone();
    for (offset, item) in rest.into_iter().enumerate() {
        let mut path = ctx.response_path();
        path.push(PathSegment::Index(first_index + offset));
        let workload = DeferredWorkload::new(
            spec.label.clone(),
            path,
            WorkloadKind::ListItem {
                parent_type_name: ctx.parent_type.name.clone(),
                field_nodes: ctx.nodes.iter().map(|node| (*node).clone()).collect(),
                item_type: inner_ty.into(),
                item,
            },
            after,
        );
        after = Some(workload.order());
        sender
            .send(workload)
            .map_err(|error| ctx.set_error_path(error.into_server_error(ctx.item.pos)))?;
    }
    Ok(())
}

/// Collect the sub-selection once when every element of the list completes
/// under the same concrete object type; list execution re-enters completion
/// with identical field nodes for each element, so the grouped set can be
/// shared across all of them.
fn precollect_element_fields<'a>(
    ctx: &ContextField<'a>,
    inner_ty: &str,
) -> ServerResult<Option<CollectedFields<'a>>> {
    let MetaTypeName::Named(name) = MetaTypeName::create(inner_ty).unwrap_non_null() else {
        return Ok(None);
    };
    match ctx.registry().lookup_type(name) {
        Some(MetaType::Object(object)) => {
            Ok(Some(collect_fields(ctx, &object.name, ctx.selection_sets())?))
        }
        _ => Ok(None),
    }
}
