//! The execution entry points: [`Schema::execute`], [`Schema::execute_sync`]
//! and [`Schema::execute_stream`].

use std::sync::Arc;

use async_graphql_parser::{
    parse_query,
    types::{DocumentOperations, OperationDefinition, OperationType},
};
use async_graphql_value::ConstValue;
use futures_util::{stream::FuturesUnordered, FutureExt, Stream, StreamExt};
use tracing::Instrument;
use ulid::Ulid;

use crate::{
    context::{
        ContextSelectionSet, Data, ExecutionScope, QueryEnv, QueryEnvBuilder, QueryEnvInner,
        SchemaEnv, SchemaEnvInner,
    },
    deferred::{execute_workload, workload_channel},
    registry::{
        DirectiveLocation, MetaDirective, MetaInputValue, MetaType, MetaTypeName, Registry,
        ScalarType,
    },
    request::IntrospectionState,
    resolver_utils::{
        install_introspection_types, resolve_container, resolve_container_serial, resolve_input,
        IntrospectionRoot,
    },
    response::CompletionPayload,
    Positioned, Request, Response, ServerError, StreamingPayload, Variables,
};

/// Variable-coercion failures beyond this count abort with a terminal error.
const MAX_VARIABLE_ERRORS: usize = 50;

/// An inconsistency detected while finishing a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("the registry has no type named {0}")]
    UnknownType(String),
    #[error("the {operation} root type {name} must be an object type")]
    InvalidRootType { operation: &'static str, name: String },
    #[error("type {ty} implements {interface}, which is not an interface in the registry")]
    UnknownInterface { ty: String, interface: String },
}

/// Builder for a [`Schema`].
pub struct SchemaBuilder {
    registry: Registry,
    data: Data,
}

impl SchemaBuilder {
    /// Add global data reachable from every resolver via `ctx.data`.
    #[must_use]
    pub fn data<D: std::any::Any + Send + Sync>(mut self, data: D) -> Self {
        self.data.insert(data);
        self
    }

    /// Refuse `__schema` / `__type` selections unless a request forces them
    /// back on.
    #[must_use]
    pub fn disable_introspection(mut self) -> Self {
        self.registry.disable_introspection = true;
        self
    }

    /// Check the registry, link interface implementations, register the
    /// built-in scalars, directives and introspection types, and produce the
    /// executable schema.
    pub fn finish(self) -> Result<Schema, SchemaError> {
        let mut registry = registry_with_builtin_scalars(self.registry);
        install_default_directives(&mut registry);
        link_interface_implementations(&mut registry)?;
        check_root_types(&registry)?;
        install_introspection_types(&mut registry);

        Ok(Schema(SchemaEnv::new(SchemaEnvInner {
            registry,
            data: self.data,
            introspection: IntrospectionRoot::default(),
        })))
    }
}

/// An executable schema: a checked registry plus schema-scoped data.
///
/// Cheap to clone; executions share the registry behind an `Arc`.
#[derive(Clone, Debug)]
pub struct Schema(SchemaEnv);

impl Schema {
    /// Start building a schema around `registry`.
    pub fn build(registry: Registry) -> SchemaBuilder {
        SchemaBuilder {
            registry,
            data: Data::default(),
        }
    }

    /// Build a schema directly.
    ///
    /// # Panics
    ///
    /// Panics when the registry is inconsistent; use
    /// [`Schema::build`] + [`SchemaBuilder::finish`] to handle the error
    /// instead.
    pub fn new(registry: Registry) -> Schema {
        Schema::build(registry).finish().expect("invalid schema registry")
    }

    pub fn registry(&self) -> &Registry {
        &self.0.registry
    }

    /// Execute a request and return the full response.
    ///
    /// Incremental-delivery directives are inert on this surface: `@defer`
    /// fragments resolve in place and `@stream` lists complete fully. Use
    /// [`Schema::execute_stream`] for a surface that delivers them
    /// incrementally.
    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        match self.prepare_request(request.into()) {
            Ok(env_builder) => self.execute_once(env_builder.build()).await,
            Err(errors) => Response::from_errors(errors),
        }
    }

    /// Execute a request that is known not to suspend: every resolver
    /// returns an immediate value and nothing defers.
    ///
    /// # Panics
    ///
    /// Panics if execution suspends on an asynchronous resolver.
    pub fn execute_sync(&self, request: impl Into<Request>) -> Response {
        self.execute(request)
            .now_or_never()
            .expect("query execution suspended on an asynchronous resolver; use `execute` instead")
    }

    /// Execute a request with incremental delivery: the stream yields the
    /// initial response, then one payload per `@defer` fragment and
    /// `@stream`ed item, then a final `{"hasNext": false}` payload.
    ///
    /// Dropping the stream cancels all pending payloads and their source
    /// streams.
    pub fn execute_stream(
        &self,
        request: impl Into<Request>,
    ) -> impl Stream<Item = StreamingPayload> + Send + 'static {
        let schema = self.clone();
        let request = request.into();
        async_stream::stream! {
            let env_builder = match schema.prepare_request(request) {
                Ok(builder) => builder,
                Err(errors) => {
                    yield Response::from_errors(errors).into_streaming_payload(false);
                    return;
                }
            };

            let (sender, mut receiver) = workload_channel();
            let env = env_builder.with_deferred_sender(sender).build();
            let initial = schema.execute_once(env.clone()).await;

            let mut pending = FuturesUnordered::new();
            while let Some(workload) = receiver.receive() {
                pending.push(execute_workload(workload, &schema.0, &env));
            }

            let has_next = !pending.is_empty();
            yield initial.into_streaming_payload(has_next);
            if !has_next {
                return;
            }

            while let Some(result) = pending.next().await {
                // Anything the finished workload registered joins the race.
                while let Some(workload) = receiver.receive() {
                    pending.push(execute_workload(workload, &schema.0, &env));
                }
                match result {
                    Some(payload) => yield StreamingPayload::Incremental(payload),
                    // A completed stream source has nothing to patch.
                    None => continue,
                }
            }

            yield StreamingPayload::Completion(CompletionPayload::new());
        }
    }

    async fn execute_once(&self, env: QueryEnv) -> Response {
        let operation_type = env.operation.node.ty;
        let root_type = match self.0.registry.root_type(operation_type) {
            Some(MetaType::Object(object)) => object,
            _ => {
                let name = match operation_type {
                    OperationType::Query => "queries",
                    OperationType::Mutation => "mutations",
                    OperationType::Subscription => "subscriptions",
                };
                return Response::from_errors(vec![ServerError::new(
                    format!("Schema is not configured for {name}."),
                    None,
                )]);
            }
        };

        let span = tracing::debug_span!(
            "execute",
            operation_type = %operation_type,
            operation_name = env.operation_name.as_deref().unwrap_or_default(),
            execution_id = %env.execution_id,
        );

        let scope = ExecutionScope::default();
        let ctx = ContextSelectionSet {
            ty: root_type,
            path_node: None,
            item: &env.operation.node.selection_set,
            schema_env: &self.0,
            query_env: &env,
            scope: &scope,
        };

        // The initial payload of a subscription executes exactly like a
        // query; only mutations serialize their root fields.
        let result = match operation_type {
            OperationType::Mutation => resolve_container_serial(&ctx, &env.root_value).instrument(span).await,
            _ => resolve_container(&ctx, &env.root_value).instrument(span).await,
        };

        let data = match result {
            Ok(value) => value,
            Err(error) => {
                scope.push_error(error);
                ConstValue::Null
            }
        };

        Response {
            data: Some(data),
            errors: scope.take_errors(),
            extensions: Default::default(),
        }
    }

    fn prepare_request(&self, request: Request) -> Result<QueryEnvBuilder, Vec<ServerError>> {
        let document = parse_query(&request.query)
            .map_err(|error| vec![ServerError::new(error.to_string(), None)])?;

        let operation = select_operation(document.operations, request.operation_name.as_deref())?;
        let variables = coerce_variable_values(&self.0.registry, &operation, request.variables)?;

        let introspection_enabled = match request.introspection_state {
            IntrospectionState::ForceEnabled => true,
            IntrospectionState::ForceDisabled => false,
            IntrospectionState::UserPreference => !self.0.registry.disable_introspection,
        };

        Ok(QueryEnvBuilder::new(QueryEnvInner {
            operation,
            operation_name: request.operation_name,
            fragments: document.fragments,
            variables,
            root_value: request.root_value.unwrap_or(ConstValue::Null),
            ctx_data: Arc::new(request.data),
            introspection_enabled,
            field_resolver: request.field_resolver,
            type_resolver: request.type_resolver,
            subscribe_field_resolver: request.subscribe_field_resolver,
            deferred_workloads: None,
            execution_id: Ulid::new(),
        }))
    }
}

fn select_operation(
    operations: DocumentOperations,
    operation_name: Option<&str>,
) -> Result<Positioned<OperationDefinition>, Vec<ServerError>> {
    match (operations, operation_name) {
        (DocumentOperations::Single(operation), None) => Ok(operation),
        (DocumentOperations::Single(_), Some(name)) => Err(vec![ServerError::new(
            format!(r#"Unknown operation named "{name}"."#),
            None,
        )]),
        (DocumentOperations::Multiple(mut operations), Some(name)) => operations
            .remove(name)
            .ok_or_else(|| {
                vec![ServerError::new(
                    format!(r#"Unknown operation named "{name}"."#),
                    None,
                )]
            }),
        (DocumentOperations::Multiple(operations), None) => {
            if operations.len() == 1 {
                Ok(operations.into_iter().next().map(|(_, operation)| operation).expect("len == 1"))
            } else {
                Err(vec![ServerError::new(
                    "Must provide operation name if query contains multiple operations.",
                    None,
                )])
            }
        }
    }
}

/// Coerce the request variables against the operation's variable
/// definitions, applying defaults and collecting at most
/// [`MAX_VARIABLE_ERRORS`] failures.
fn coerce_variable_values(
    registry: &Registry,
    operation: &Positioned<OperationDefinition>,
    variables: Variables,
) -> Result<Variables, Vec<ServerError>> {
    let mut coerced = Variables::default();
    let mut errors = Vec::new();

    for definition in &operation.node.variable_definitions {
        if errors.len() >= MAX_VARIABLE_ERRORS {
            errors.push(ServerError::new(
                "Too many errors processing variables, error limit reached. Execution aborted.",
                None,
            ));
            return Err(errors);
        }

        let name = definition.node.name.node.clone();
        let ty = definition.node.var_type.node.to_string();

        match registry.lookup_type(MetaTypeName::concrete_typename(&ty)) {
            Some(meta) if meta.is_input() => {}
            _ => {
                errors.push(ServerError::new(
                    format!(
                        r#"Variable "${name}" expected value of type "{ty}" which cannot be used as an input type."#
                    ),
                    Some(definition.pos),
                ));
                continue;
            }
        }

        match variables.get(&name) {
            Some(value) => {
                let meta_input = MetaInputValue::new(name.as_str(), ty.as_str());
                match resolve_input(registry, definition.pos, &meta_input, Some(value.clone())) {
                    Ok(Some(value)) => {
                        coerced.insert(name, value);
                    }
                    Ok(None) => {}
                    Err(mut error) => {
                        error.message = format!(r#"Variable "${name}" got invalid value; {}"#, error.message);
                        errors.push(error);
                    }
                }
            }
            None => match definition.node.default_value() {
                Some(default) => {
                    coerced.insert(name, default.clone());
                }
                None if ty.ends_with('!') => {
                    errors.push(ServerError::new(
                        format!(r#"Variable "${name}" of required type "{ty}" was not provided."#),
                        Some(definition.pos),
                    ));
                }
                None => {}
            },
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}

/// Register the five built-in scalars, leaving any caller-provided
/// definition of them untouched.
pub(crate) fn registry_with_builtin_scalars(mut registry: Registry) -> Registry {
    let builtin = [
        ScalarType::new("Int")
            .with_description(
                "The `Int` scalar type represents non-fractional signed whole numeric values.",
            )
            .with_validator(|value| {
                matches!(value, ConstValue::Number(n) if n.as_i64().map_or(false, |n| i32::try_from(n).is_ok()))
            }),
        ScalarType::new("Float")
            .with_description(
                "The `Float` scalar type represents signed double-precision fractional values.",
            )
            .with_validator(|value| matches!(value, ConstValue::Number(n) if n.as_f64().is_some())),
        ScalarType::new("String")
            .with_description(
                "The `String` scalar type represents textual data, represented as UTF-8 character sequences.",
            )
            .with_validator(|value| matches!(value, ConstValue::String(_))),
        ScalarType::new("Boolean")
            .with_description("The `Boolean` scalar type represents `true` or `false`.")
            .with_validator(|value| matches!(value, ConstValue::Boolean(_))),
        ScalarType::new("ID")
            .with_description(
                "The `ID` scalar type represents a unique identifier, often used to refetch an object or as key for a cache.",
            )
            .with_validator(|value| {
                matches!(value, ConstValue::String(_)) || matches!(value, ConstValue::Number(n) if n.is_u64() || n.is_i64())
            }),
    ];
    for scalar in builtin {
        if registry.lookup_type(&scalar.name).is_none() {
            registry.insert_type(scalar);
        }
    }
    registry
}

fn install_default_directives(registry: &mut Registry) {
    use DirectiveLocation::*;

    let defaults = [
        MetaDirective::new("include", vec![FIELD, FRAGMENT_SPREAD, INLINE_FRAGMENT])
            .with_description(
                "Directs the executor to include this field or fragment only when the `if` argument is true.",
            )
            .argument(MetaInputValue::new("if", "Boolean!").with_description("Included when true.")),
        MetaDirective::new("skip", vec![FIELD, FRAGMENT_SPREAD, INLINE_FRAGMENT])
            .with_description(
                "Directs the executor to skip this field or fragment when the `if` argument is true.",
            )
            .argument(MetaInputValue::new("if", "Boolean!").with_description("Skipped when true.")),
        MetaDirective::new("defer", vec![FRAGMENT_SPREAD, INLINE_FRAGMENT])
            .with_description(
                "De-prioritizes a fragment, causing the fragment to be omitted in the initial response and delivered as a subsequent response afterward.",
            )
            .argument(
                MetaInputValue::new("if", "Boolean!")
                    .with_description("When true, fragment may be deferred.")
                    .with_default(ConstValue::Boolean(true)),
            )
            .argument(MetaInputValue::new("label", "String").with_description("A unique label to identify the deferred fragment.")),
        MetaDirective::new("stream", vec![FIELD])
            .with_description(
                "Requests the executor to stream list items as they become available, rather than waiting for the full list.",
            )
            .argument(
                MetaInputValue::new("if", "Boolean!")
                    .with_description("When true, the field may be streamed.")
                    .with_default(ConstValue::Boolean(true)),
            )
            .argument(MetaInputValue::new("label", "String").with_description("A unique label to identify the streamed field."))
            .argument(
                MetaInputValue::new("initialCount", "Int!")
                    .with_description("The number of list items to deliver in the initial response.")
                    .with_default(ConstValue::from(0)),
            ),
        MetaDirective::new(
            "deprecated",
            vec![FIELD_DEFINITION, ARGUMENT_DEFINITION, INPUT_FIELD_DEFINITION, ENUM_VALUE],
        )
        .with_description("Marks an element of a GraphQL schema as no longer supported.")
        .argument(
            MetaInputValue::new("reason", "String")
                .with_description("A reason for why it is deprecated, formatted using Markdown syntax.")
                .with_default(ConstValue::String("No longer supported".into())),
        ),
        MetaDirective::new("specifiedBy", vec![SCALAR])
            .with_description("Provides a scalar specification URL.")
            .argument(MetaInputValue::new("url", "String!").with_description("The specification URL.")),
    ];

    for directive in defaults {
        if !registry.directives.contains_key(&directive.name) {
            registry.directives.insert(directive.name.clone(), directive);
        }
    }
}

/// Make sure every interface an object declares exists, and that the
/// interface knows the object as a possible type.
fn link_interface_implementations(registry: &mut Registry) -> Result<(), SchemaError> {
    let mut links = Vec::new();
    for ty in registry.types.values() {
        if let MetaType::Object(object) = ty {
            for interface in &object.implements {
                match registry.types.get(interface) {
                    Some(MetaType::Interface(_)) => {
                        links.push((interface.clone(), object.name.clone()));
                    }
                    _ => {
                        return Err(SchemaError::UnknownInterface {
                            ty: object.name.clone(),
                            interface: interface.clone(),
                        })
                    }
                }
            }
        }
    }
    for (interface, object) in links {
        if let Some(MetaType::Interface(interface)) = registry.types.get_mut(&interface) {
            interface.possible_types.insert(object);
        }
    }
    Ok(())
}

fn check_root_types(registry: &Registry) -> Result<(), SchemaError> {
    let mut roots = vec![("query", registry.query_type.as_str())];
    if let Some(name) = registry.mutation_type.as_deref() {
        roots.push(("mutation", name));
    }
    if let Some(name) = registry.subscription_type.as_deref() {
        roots.push(("subscription", name));
    }
    for (operation, name) in roots {
        match registry.types.get(name) {
            None => return Err(SchemaError::UnknownType(name.to_string())),
            Some(MetaType::Object(_)) => {}
            Some(_) => {
                return Err(SchemaError::InvalidRootType {
                    operation,
                    name: name.to_string(),
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_graphql_value::value;

    use super::*;
    use crate::registry::{MetaField, ObjectType};

    fn one_field_schema() -> Schema {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("answer", "Int").resolve_with(|_: crate::ResolverContext<'_>| {
                crate::FieldFuture::from_value(value!(42))
            })],
        ));
        Schema::new(registry)
    }

    #[test]
    fn synchronous_resolvers_complete_synchronously() {
        let response = one_field_schema().execute_sync("{ answer }");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({ "data": { "answer": 42 } })
        );
    }

    #[test]
    fn finishing_rejects_unknown_interfaces() {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new("Query", [MetaField::new("a", "Int")]).implement("Ghost"));
        let error = Schema::build(registry).finish().unwrap_err();
        assert!(matches!(error, SchemaError::UnknownInterface { .. }));
    }

    #[test]
    fn finishing_rejects_missing_mutation_roots() {
        let mut registry = Registry::new();
        registry.mutation_type = Some("Mutation".to_string());
        let error = Schema::build(registry).finish().unwrap_err();
        assert!(matches!(error, SchemaError::UnknownType(name) if name == "Mutation"));
    }

    #[test]
    fn a_stream_without_incremental_directives_is_a_single_payload() {
        let payloads = futures::executor::block_on(async {
            use futures_util::StreamExt;
            one_field_schema()
                .execute_stream("{ answer }")
                .collect::<Vec<_>>()
                .await
        });
        assert_eq!(payloads.len(), 1);
        assert_eq!(
            serde_json::to_value(&payloads[0]).unwrap(),
            serde_json::json!({ "data": { "answer": 42 }, "hasNext": false })
        );
    }

    #[test]
    fn typename_is_available_on_the_root() {
        let response = futures::executor::block_on(
            one_field_schema().execute("{ answer __typename }"),
        );
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({ "data": { "answer": 42, "__typename": "Query" } })
        );
    }
}
