use std::fmt::{self, Debug, Formatter};

use async_graphql_value::ConstValue;
use futures_util::stream::BoxStream;

use crate::Result;

/// A stream of values produced by a resolver, the asynchronous counterpart of
/// returning a list.
pub type ValueStream = BoxStream<'static, Result<ConstValue>>;

/// The result of running a resolver.
///
/// Synchronous iterables are plain [`ConstValue::List`] values; a resolver
/// that produces its items lazily returns [`ResolvedValue::Stream`] instead,
/// which is what `@stream` consumes item by item.
pub enum ResolvedValue {
    /// A fully materialized value.
    Value(ConstValue),
    /// An asynchronous sequence of list items.
    Stream(ValueStream),
}

impl ResolvedValue {
    /// The null value.
    pub fn null() -> Self {
        ResolvedValue::Value(ConstValue::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ResolvedValue::Value(ConstValue::Null))
    }
}

impl Debug for ResolvedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ResolvedValue::Stream(_) => f.debug_tuple("Stream").field(&"..").finish(),
        }
    }
}

impl From<ConstValue> for ResolvedValue {
    fn from(value: ConstValue) -> Self {
        ResolvedValue::Value(value)
    }
}
