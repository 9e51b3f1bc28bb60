//! Deferred workloads: the units of incremental delivery.
//!
//! `@defer` fragments and `@stream`ed list tails are not resolved in place.
//! They are packaged as [`DeferredWorkload`]s, sent through an unbounded
//! channel, and executed by the subsequent-payload driver behind
//! [`Schema::execute_stream`](crate::Schema::execute_stream), each producing
//! one [`IncrementalPayload`].
//!
//! Delivery order is constrained, not free-for-all: a workload carries an
//! optional `after` signal (the completion of its parent payload's data) and
//! exposes its own `order` signal for its children. Racing the workload
//! futures then yields parents before children and stream items in index
//! order.

use async_graphql_value::ConstValue;
use futures_channel::{mpsc, oneshot};
use futures_util::{
    future::{BoxFuture, Shared},
    FutureExt, StreamExt,
};

use crate::{
    context::{ContextField, ContextSelectionSet, ExecutionScope, QueryEnv, SchemaEnv},
    parser::types::{Field, SelectionSet},
    registry::resolvers::{ResolvedValue, ValueStream},
    registry::MetaFieldType,
    resolver_utils::{complete_value, resolve_container},
    response::IncrementalPayload,
    Error, PathSegment, Positioned, ServerError,
};

/// Completion signal of one payload's data.
pub(crate) type PayloadOrdering = Shared<BoxFuture<'static, ()>>;

/// A sender half fired when a payload's data has settled, and the cloneable
/// signal observers wait on. A dropped sender counts as settled so a failed
/// parent never wedges its children.
pub(crate) fn ordering_signal() -> (oneshot::Sender<()>, PayloadOrdering) {
    let (sender, receiver) = oneshot::channel::<()>();
    (sender, receiver.map(|_| ()).boxed().shared())
}

/// One pending incremental payload.
pub struct DeferredWorkload {
    pub label: Option<String>,
    /// Response path the payload patches into.
    pub path: Vec<PathSegment>,
    pub(crate) kind: WorkloadKind,
    pub(crate) after: Option<PayloadOrdering>,
    pub(crate) done: oneshot::Sender<()>,
    pub(crate) order: PayloadOrdering,
}

pub(crate) enum WorkloadKind {
    /// A `@defer`red fragment: its selection set executes under the runtime
    /// type it was collected at, against the parent resolver value.
    Fragment {
        type_name: String,
        selection_set: Positioned<SelectionSet>,
        parent_value: ConstValue,
    },
    /// One already-resolved element of a `@stream`ed synchronous list.
    ListItem {
        parent_type_name: String,
        field_nodes: Vec<Positioned<Field>>,
        item_type: MetaFieldType,
        item: ConstValue,
    },
    /// Driver for a `@stream`ed asynchronous source: pulls one item, emits
    /// its payload, and re-registers itself for the next index.
    StreamDriver {
        parent_type_name: String,
        field_nodes: Vec<Positioned<Field>>,
        item_type: MetaFieldType,
        stream: ValueStream,
        index: usize,
    },
}

impl DeferredWorkload {
    pub(crate) fn new(
        label: Option<String>,
        path: Vec<PathSegment>,
        kind: WorkloadKind,
        after: Option<PayloadOrdering>,
    ) -> Self {
        let (done, order) = ordering_signal();
        DeferredWorkload {
            label,
            path,
            kind,
            after,
            done,
            order,
        }
    }

    /// The signal children of this workload sequence themselves after.
    pub(crate) fn order(&self) -> PayloadOrdering {
        self.order.clone()
    }
}

#[derive(Clone)]
pub struct DeferredWorkloadSender(mpsc::UnboundedSender<DeferredWorkload>);

impl DeferredWorkloadSender {
    pub(crate) fn send(&self, workload: DeferredWorkload) -> Result<(), Error> {
        self.0
            .unbounded_send(workload)
            .map_err(|error| Error::new(error.to_string()))
    }
}

pub struct DeferredWorkloadReceiver(mpsc::UnboundedReceiver<DeferredWorkload>);

impl DeferredWorkloadReceiver {
    pub(crate) fn receive(&mut self) -> Option<DeferredWorkload> {
        self.0.try_next().ok().flatten()
    }
}

pub fn workload_channel() -> (DeferredWorkloadSender, DeferredWorkloadReceiver) {
    let (sender, receiver) = mpsc::unbounded();
    (DeferredWorkloadSender(sender), DeferredWorkloadReceiver(receiver))
}

/// Execute one workload to a payload.
///
/// Returns `None` for the completed-iterator case: a stream driver that found
/// its source exhausted has nothing to patch and must not emit.
pub(crate) async fn execute_workload(
    workload: DeferredWorkload,
    schema_env: &SchemaEnv,
    query_env: &QueryEnv,
) -> Option<IncrementalPayload> {
    if let Some(after) = &workload.after {
        after.clone().await;
    }

    let DeferredWorkload {
        label,
        path,
        kind,
        after: _,
        done,
        order,
    } = workload;

    match kind {
        WorkloadKind::Fragment {
            type_name,
            selection_set,
            parent_value,
        } => {
            let scope = ExecutionScope::new(Some(order), path.clone());
            let data = match schema_env.registry.lookup_type(&type_name).and_then(|meta| meta.object()) {
                Some(ty) => {
                    let ctx = ContextSelectionSet {
                        ty,
                        path_node: None,
                        item: &selection_set,
                        schema_env,
                        query_env,
                        scope: &scope,
                    };
                    match resolve_container(&ctx, &parent_value).await {
                        Ok(value) => value,
                        Err(error) => {
                            scope.push_error(error);
                            ConstValue::Null
                        }
                    }
                }
                None => {
                    scope.push_error(ServerError::new(
                        format!("Internal error: unknown type {type_name} for a deferred fragment"),
                        None,
                    ));
                    ConstValue::Null
                }
            };
            let _ = done.send(());
            Some(IncrementalPayload {
                label,
                data,
                path,
                has_next: true,
                errors: scope.take_errors(),
            })
        }
        WorkloadKind::ListItem {
            parent_type_name,
            field_nodes,
            item_type,
            item,
        } => {
            let scope = ExecutionScope::new(Some(order), path.clone());
            let data = complete_workload_item(
                schema_env,
                query_env,
                &scope,
                &parent_type_name,
                &field_nodes,
                &item_type,
                item,
            )
            .await;
            let _ = done.send(());
            Some(IncrementalPayload {
                label,
                data,
                path,
                has_next: true,
                errors: scope.take_errors(),
            })
        }
        WorkloadKind::StreamDriver {
            parent_type_name,
            field_nodes,
            item_type,
            mut stream,
            index,
        } => {
            let mut item_path = path.clone();
            item_path.push(PathSegment::Index(index));

            match stream.next().await {
                None => {
                    // The source is exhausted. Nothing to patch.
                    let _ = done.send(());
                    None
                }
                Some(Err(error)) => {
                    let pos = field_nodes.first().map(|node| node.pos);
                    let mut error = error.into_server_error(pos.unwrap_or_default());
                    error.path = item_path.clone();
                    let _ = done.send(());
                    Some(IncrementalPayload {
                        label,
                        data: ConstValue::Null,
                        path: item_path,
                        has_next: true,
                        errors: vec![error],
                    })
                }
                Some(Ok(item)) => {
                    let scope = ExecutionScope::new(Some(order.clone()), item_path.clone());
                    let data = complete_workload_item(
                        schema_env,
                        query_env,
                        &scope,
                        &parent_type_name,
                        &field_nodes,
                        &item_type,
                        item,
                    )
                    .await;

                    // Re-register for the next index, sequenced after this
                    // item's data.
                    if let Some(sender) = &query_env.deferred_workloads {
                        let next = DeferredWorkload::new(
                            label.clone(),
                            path,
                            WorkloadKind::StreamDriver {
                                parent_type_name,
                                field_nodes,
                                item_type,
                                stream,
                                index: index + 1,
                            },
                            Some(order),
                        );
                        let _ = sender.send(next);
                    }

                    let _ = done.send(());
                    Some(IncrementalPayload {
                        label,
                        data,
                        path: item_path,
                        has_next: true,
                        errors: scope.take_errors(),
                    })
                }
            }
        }
    }
}

/// Complete a single streamed list element under the field it came from.
async fn complete_workload_item(
    schema_env: &SchemaEnv,
    query_env: &QueryEnv,
    scope: &ExecutionScope,
    parent_type_name: &str,
    field_nodes: &[Positioned<Field>],
    item_type: &MetaFieldType,
    item: ConstValue,
) -> ConstValue {
    let parent_type = schema_env
        .registry
        .lookup_type(parent_type_name)
        .and_then(|meta| meta.object());
    let field = field_nodes
        .first()
        .and_then(|node| parent_type.and_then(|ty| ty.field_by_name(node.node.name.node.as_str())));

    let (Some(parent_type), Some(field), Some(first)) = (parent_type, field, field_nodes.first()) else {
        scope.push_error(ServerError::new(
            format!("Internal error: unknown field for a streamed list on {parent_type_name}"),
            None,
        ));
        return ConstValue::Null;
    };

    let nodes = field_nodes.iter().collect::<Vec<_>>();
    let ctx = ContextField {
        parent_type,
        field,
        item: first,
        nodes: &nodes,
        path_node: None,
        schema_env,
        query_env,
        scope,
    };

    match complete_value(&ctx, item_type.as_str(), ResolvedValue::Value(item), None, None).await {
        Ok(value) => value,
        Err(error) => {
            scope.push_error(error);
            ConstValue::Null
        }
    }
}
