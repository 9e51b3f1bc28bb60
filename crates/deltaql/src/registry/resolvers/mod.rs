//! Resolver hooks stored on the registry, and the values they produce.
//!
//! Resolvers are plain functions behind `Arc`: given the parent value, the
//! coerced arguments and the surrounding context they produce either an
//! immediate [`ResolvedValue`] or a future of one. Keeping the two cases
//! apart is what lets a fully synchronous resolver chain complete without
//! ever suspending.

mod resolved_value;

use std::future::Future;
use std::sync::Arc;

use async_graphql_value::{ConstValue, Name};
use futures_util::future::BoxFuture;
use indexmap::IndexMap;

pub use resolved_value::{ResolvedValue, ValueStream};

use crate::{
    context::ContextField,
    query_path::QueryPathNode,
    registry::MetaFieldType,
    Result,
};

/// A field resolver.
pub type BoxResolverFn =
    Arc<dyn for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync>;

/// Resolves the concrete runtime type of an abstract-typed value, by name.
pub type ResolveTypeFn = Arc<
    dyn for<'a> Fn(TypeResolutionContext<'a>) -> BoxFuture<'a, Result<Option<String>>>
        + Send
        + Sync,
>;

/// Predicate deciding whether a value belongs to an object type.
pub type IsTypeOfFn = Arc<dyn for<'a> Fn(&'a ConstValue) -> BoxFuture<'a, bool> + Send + Sync>;

/// Serialization hook of a scalar type.
pub type ScalarSerializeFn = Arc<dyn Fn(ConstValue) -> Result<ConstValue> + Send + Sync>;

/// A resolver result that is either immediately available or still being
/// computed.
pub enum FieldFuture<'a> {
    Value(Result<ResolvedValue>),
    Future(BoxFuture<'a, Result<ResolvedValue>>),
}

impl<'a> FieldFuture<'a> {
    /// Create a `FieldFuture` from a future of a resolved value.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<ResolvedValue>> + Send + 'a,
    {
        FieldFuture::Future(Box::pin(future))
    }

    /// Create a `FieldFuture` from an immediately available value.
    pub fn from_value(value: ConstValue) -> Self {
        FieldFuture::Value(Ok(ResolvedValue::Value(value)))
    }

    /// Create a `FieldFuture` from an immediately available stream of list
    /// items.
    pub fn from_stream(stream: ValueStream) -> Self {
        FieldFuture::Value(Ok(ResolvedValue::Stream(stream)))
    }

    /// Create an immediately failed `FieldFuture`.
    pub fn error(error: impl Into<crate::Error>) -> Self {
        FieldFuture::Value(Err(error.into()))
    }

    pub(crate) async fn resolve(self) -> Result<ResolvedValue> {
        match self {
            FieldFuture::Value(result) => result,
            FieldFuture::Future(future) => future.await,
        }
    }
}

impl<'a> From<ConstValue> for FieldFuture<'a> {
    fn from(value: ConstValue) -> Self {
        FieldFuture::from_value(value)
    }
}

/// Everything a field resolver gets to see about the current invocation.
#[derive(Clone, Copy)]
pub struct ResolverContext<'a> {
    /// The context of the field being resolved.
    pub ctx: &'a ContextField<'a>,
    /// The value the parent resolver produced.
    pub parent_value: &'a ConstValue,
    /// The coerced arguments of this field.
    pub args: &'a IndexMap<Name, ConstValue>,
    /// Informational snapshot of the invocation.
    pub info: ResolveInfo<'a>,
}

impl<'a> ResolverContext<'a> {
    /// An argument by name, `ConstValue::Null` when absent.
    pub fn arg(&self, name: &str) -> &'a ConstValue {
        self.args.get(name).unwrap_or(&ConstValue::Null)
    }
}

/// Context handed to a `resolve_type` hook when resolving the concrete type
/// of an abstract-typed value.
#[derive(Clone, Copy)]
pub struct TypeResolutionContext<'a> {
    /// The context of the field whose value is being completed.
    pub ctx: &'a ContextField<'a>,
    /// The value whose concrete type is wanted.
    pub value: &'a ConstValue,
    /// The name of the abstract type being resolved.
    pub abstract_type: &'a str,
}

/// Informational snapshot describing the current resolver invocation.
///
/// Everything else (schema, fragments, variables, root value, operation) is
/// reachable through the field context.
#[derive(Clone, Copy)]
pub struct ResolveInfo<'a> {
    /// Current path node, terminating at this field's response name.
    pub path_node: &'a QueryPathNode<'a>,
    /// The name of the type the field belongs to.
    pub parent_type: &'a str,
    /// The declared return type of the field.
    pub return_type: &'a MetaFieldType,
    /// The field name.
    pub name: &'a str,
    /// The field alias, if any.
    pub alias: Option<&'a str>,
}

/// The default field resolver: read the property named after the field from
/// an object-shaped parent value. Anything else resolves to null.
pub(crate) fn resolve_property(parent_value: &ConstValue, field_name: &str) -> ConstValue {
    match parent_value {
        ConstValue::Object(object) => object.get(field_name).cloned().unwrap_or(ConstValue::Null),
        _ => ConstValue::Null,
    }
}

/// The `__typename` fast path of the default type resolver.
pub(crate) fn typename_property(value: &ConstValue) -> Option<&str> {
    match value {
        ConstValue::Object(object) => match object.get("__typename") {
            Some(ConstValue::String(name)) => Some(name.as_str()),
            _ => None,
        },
        _ => None,
    }
}
