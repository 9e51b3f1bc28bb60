use std::fmt::{self, Debug, Formatter};

use async_graphql_value::ConstValue;
use serde::{Deserialize, Serialize};

use crate::{
    context::Data,
    registry::resolvers::{BoxResolverFn, FieldFuture, ResolveTypeFn, ResolverContext},
    Variables,
};

/// Whether introspection is available to a request.
#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Debug, Clone, Copy, Hash)]
#[serde(rename_all = "camelCase")]
pub enum IntrospectionState {
    ForceEnabled,
    ForceDisabled,
    /// Follow the registry's `disable_introspection` flag.
    #[default]
    UserPreference,
}

/// GraphQL request.
///
/// This can be deserialized from a structure of the query string, the
/// operation name and the variables. The names are all in `camelCase`
/// (e.g. `operationName`).
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// The query source of the request.
    #[serde(default)]
    pub query: String,

    /// The operation name of the request.
    #[serde(default)]
    pub operation_name: Option<String>,

    /// The variables of the request.
    #[serde(default)]
    pub variables: Variables,

    /// The value the root selection set resolves against.
    #[serde(skip)]
    pub root_value: Option<ConstValue>,

    /// Force the introspection state for this request.
    #[serde(skip)]
    pub introspection_state: IntrospectionState,

    /// The data of the request that can be accessed through `ctx.data`.
    ///
    /// **This data is only valid for this request.**
    #[serde(skip)]
    pub data: Data,

    /// Resolver used for fields without one of their own.
    #[serde(skip)]
    pub field_resolver: Option<BoxResolverFn>,

    /// Runtime-type resolver used for abstract types without one of their
    /// own.
    #[serde(skip)]
    pub type_resolver: Option<ResolveTypeFn>,

    /// Resolver the subscription layer uses for the root subscription
    /// fields. Carried here; the execution core itself treats a
    /// subscription's initial payload like a query.
    #[serde(skip)]
    pub subscribe_field_resolver: Option<BoxResolverFn>,
}

impl Request {
    /// Create a request object with query source.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: Variables::default(),
            root_value: None,
            introspection_state: IntrospectionState::default(),
            data: Data::default(),
            field_resolver: None,
            type_resolver: None,
            subscribe_field_resolver: None,
        }
    }

    /// Specify the operation name of the request.
    #[must_use]
    pub fn with_operation_name<T: Into<String>>(self, name: T) -> Self {
        Self {
            operation_name: Some(name.into()),
            ..self
        }
    }

    /// Specify the variables.
    #[must_use]
    pub fn variables(self, variables: Variables) -> Self {
        Self { variables, ..self }
    }

    /// Specify the root value.
    #[must_use]
    pub fn root_value(self, value: ConstValue) -> Self {
        Self {
            root_value: Some(value),
            ..self
        }
    }

    /// Insert some data for this request.
    #[must_use]
    pub fn data<D: std::any::Any + Send + Sync>(mut self, data: D) -> Self {
        self.data.insert(data);
        self
    }

    /// Set the introspection state for this request.
    #[must_use]
    pub fn set_introspection_state(mut self, state: IntrospectionState) -> Self {
        self.introspection_state = state;
        self
    }

    /// Use `resolver` for any field that has no resolver of its own, instead
    /// of the default property lookup.
    #[must_use]
    pub fn with_field_resolver<F>(mut self, resolver: F) -> Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        self.field_resolver = Some(std::sync::Arc::new(resolver));
        self
    }

    /// Use `resolver` for any abstract type that has no `resolve_type` of
    /// its own.
    #[must_use]
    pub fn with_type_resolver<F>(mut self, resolver: F) -> Self
    where
        F: for<'a> Fn(
                crate::TypeResolutionContext<'a>,
            ) -> futures_util::future::BoxFuture<'a, crate::Result<Option<String>>>
            + Send
            + Sync
            + 'static,
    {
        self.type_resolver = Some(std::sync::Arc::new(resolver));
        self
    }

    /// Carry a resolver for the subscription layer's source fields.
    #[must_use]
    pub fn with_subscribe_field_resolver<F>(mut self, resolver: F) -> Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        self.subscribe_field_resolver = Some(std::sync::Arc::new(resolver));
        self
    }
}

impl<T: Into<String>> From<T> for Request {
    fn from(query: T) -> Self {
        Self::new(query)
    }
}

impl Debug for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("query", &self.query)
            .field("operation_name", &self.operation_name)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}
