//! # A GraphQL query execution engine with incremental delivery
//!
//! deltaql executes validated GraphQL operations against a read-only schema
//! [`Registry`](registry::Registry): it collects fields under fragment
//! flattening, dispatches resolvers, completes values with non-null
//! bubbling, and delivers `@defer`red fragments and `@stream`ed list items
//! as subsequent payloads.
//!
//! Parsing is delegated to `async-graphql-parser` and values are
//! `async-graphql-value`'s `ConstValue`; this crate is only the execution
//! core. Schema construction (from SDL or otherwise), static validation and
//! transports live elsewhere.
#![deny(clippy::all)]
#![deny(clippy::inefficient_to_string)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::too_many_lines)]
#![recursion_limit = "256"]
#![forbid(unsafe_code)]

mod context;
mod deferred;
mod error;
mod query_path;
mod request;
mod response;
mod schema;
mod variables;

pub mod registry;
pub mod resolver_utils;

pub use async_graphql_parser as parser;
pub use async_graphql_value::{
    from_value, to_value, value, ConstValue as Value, DeserializerError, Name, Number,
    SerializerError,
};
#[doc(no_inline)]
pub use parser::{Pos, Positioned};

pub use context::{
    Context, ContextExt, ContextField, ContextSelectionSet, Data, QueryEnv, SchemaEnv,
};
pub use error::{
    Error, ErrorExtensionValues, ErrorExtensions, PathSegment, Result, ServerError, ServerResult,
};
pub use query_path::{QueryPathNode, QueryPathSegment};
pub use registry::resolvers::{
    FieldFuture, ResolveInfo, ResolvedValue, ResolverContext, TypeResolutionContext, ValueStream,
};
pub use request::{IntrospectionState, Request};
pub use response::{
    CompletionPayload, IncrementalPayload, InitialResponse, Response, StreamingPayload,
};
pub use schema::{Schema, SchemaBuilder, SchemaError};
pub use variables::Variables;
