//! Flattening a selection set into a grouped field set.
//!
//! Walks selections in document order, expanding fragment spreads and inline
//! fragments whose type condition is satisfied by the concrete type at hand,
//! and groups field nodes by response name so that the group order is
//! first-appearance order. Fragments carrying an active `@defer` are not
//! merged: they come back as separate patches for the incremental-delivery
//! machinery.

use async_graphql_value::ConstValue;
use indexmap::IndexMap;

use crate::{
    context::{Context, ContextExt},
    parser::types::{Directive, Field, Selection, SelectionSet},
    Positioned, ServerError, ServerResult,
};

/// The outcome of collecting one selection set under a concrete type.
pub(crate) struct CollectedFields<'a> {
    /// Field nodes grouped by response name, in first-appearance order.
    pub grouped: IndexMap<&'a str, Vec<&'a Positioned<Field>>>,
    /// Fragments that carried an active `@defer`.
    pub deferred: Vec<DeferredPatch<'a>>,
}

/// One `@defer` occurrence: the fragment's selection set, to be executed
/// later under the same concrete type.
pub(crate) struct DeferredPatch<'a> {
    pub label: Option<String>,
    pub selection_set: &'a Positioned<SelectionSet>,
}

/// Collect the fields of `selection_sets` as seen by the concrete type
/// `type_name`.
///
/// Several selection sets come up when field nodes sharing a response name
/// are merged: their sub-selections flatten into one grouped set.
pub(crate) fn collect_fields<'a>(
    ctx: &impl Context<'a>,
    type_name: &str,
    selection_sets: impl IntoIterator<Item = &'a Positioned<SelectionSet>>,
) -> ServerResult<CollectedFields<'a>> {
    let mut collected = CollectedFields {
        grouped: IndexMap::new(),
        deferred: Vec::new(),
    };
    let mut spread_stack = Vec::new();
    for selection_set in selection_sets {
        add_set(ctx, type_name, selection_set, &mut collected, &mut spread_stack)?;
    }
    Ok(collected)
}

fn add_set<'a>(
    ctx: &impl Context<'a>,
    type_name: &str,
    selection_set: &'a Positioned<SelectionSet>,
    collected: &mut CollectedFields<'a>,
    spread_stack: &mut Vec<&'a str>,
) -> ServerResult<()> {
    for selection in &selection_set.node.items {
        match &selection.node {
            Selection::Field(field) => {
                if is_skipped(ctx, &field.node.directives)? {
                    continue;
                }
                collected
                    .grouped
                    .entry(field.node.response_key().node.as_str())
                    .or_default()
                    .push(field);
            }
            Selection::FragmentSpread(spread) => {
                if is_skipped(ctx, &spread.node.directives)? {
                    continue;
                }
                let name = spread.node.fragment_name.node.as_str();
                let fragment = ctx.get_fragment(name).ok_or_else(|| {
                    ServerError::new(format!(r#"Unknown fragment "{name}"."#), Some(spread.pos))
                })?;
                let condition = fragment.node.type_condition.node.on.node.as_str();
                if !ctx.registry().type_condition_matches(condition, type_name) {
                    continue;
                }
                if spread_stack.contains(&name) {
                    // Cyclic spreads are rejected upstream; never expand a
                    // fragment inside itself.
                    continue;
                }
                if let Some(label) = deferred_label(ctx, &spread.node.directives)? {
                    collected.deferred.push(DeferredPatch {
                        label,
                        selection_set: &fragment.node.selection_set,
                    });
                    continue;
                }
                spread_stack.push(name);
                add_set(ctx, type_name, &fragment.node.selection_set, collected, spread_stack)?;
                spread_stack.pop();
            }
            Selection::InlineFragment(fragment) => {
                if is_skipped(ctx, &fragment.node.directives)? {
                    continue;
                }
                if let Some(condition) = &fragment.node.type_condition {
                    let condition = condition.node.on.node.as_str();
                    if !ctx.registry().type_condition_matches(condition, type_name) {
                        continue;
                    }
                }
                if let Some(label) = deferred_label(ctx, &fragment.node.directives)? {
                    collected.deferred.push(DeferredPatch {
                        label,
                        selection_set: &fragment.node.selection_set,
                    });
                    continue;
                }
                add_set(ctx, type_name, &fragment.node.selection_set, collected, spread_stack)?;
            }
        }
    }
    Ok(())
}

/// Whether `@skip` / `@include` remove this selection.
fn is_skipped<'a>(ctx: &impl Context<'a>, directives: &'a [Positioned<Directive>]) -> ServerResult<bool> {
    for directive in directives {
        let skip = match directive.node.name.node.as_str() {
            "skip" => true,
            "include" => false,
            _ => continue,
        };
        let condition = match directive.node.get_argument("if") {
            Some(value) => matches!(
                ctx.resolve_input_value(value.clone())?,
                ConstValue::Boolean(true)
            ),
            None => false,
        };
        if condition == skip {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The label of an active `@defer` on this selection.
///
/// `Some(label)` means the selection must become a patch; `None` means it
/// merges into the current set, either because there is no `@defer`, because
/// it is disabled with `if: false`, or because the current surface doesn't
/// support incremental delivery.
fn deferred_label<'a>(
    ctx: &impl Context<'a>,
    directives: &'a [Positioned<Directive>],
) -> ServerResult<Option<Option<String>>> {
    if ctx.query_env().deferred_workloads.is_none() {
        return Ok(None);
    }
    let Some(directive) = directives.iter().find(|d| d.node.name.node == "defer") else {
        return Ok(None);
    };
    if let Some(condition) = directive.node.get_argument("if") {
        if !matches!(ctx.resolve_input_value(condition.clone())?, ConstValue::Boolean(true)) {
            return Ok(None);
        }
    }
    let label = match directive.node.get_argument("label") {
        Some(value) => match ctx.resolve_input_value(value.clone())? {
            ConstValue::String(label) => Some(label),
            ConstValue::Null => None,
            _ => {
                return Err(ServerError::new(
                    "The @defer label must be a string",
                    Some(directive.pos),
                ))
            }
        },
        None => None,
    };
    Ok(Some(label))
}
