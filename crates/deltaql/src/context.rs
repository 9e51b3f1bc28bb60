//! Query context.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    ops::Deref,
    sync::{Arc, Mutex},
};

use async_graphql_value::{ConstValue, Name, Value};
use fnv::FnvHashMap;
use ulid::Ulid;

use crate::{
    deferred::{DeferredWorkloadSender, PayloadOrdering},
    parser::types::{Field, FragmentDefinition, OperationDefinition, SelectionSet},
    query_path::{QueryPathNode, QueryPathSegment},
    registry::{
        resolvers::{BoxResolverFn, ResolveTypeFn},
        MetaField, MetaType, ObjectType, Registry,
    },
    Error, PathSegment, Pos, Positioned, Result, ServerError, ServerResult, Variables,
};

/// Schema/request data.
///
/// This is a type map, allowing you to store anything inside it.
#[derive(Default)]
pub struct Data(FnvHashMap<TypeId, Box<dyn Any + Sync + Send>>);

impl Data {
    /// Insert data.
    pub fn insert<D: Any + Send + Sync>(&mut self, data: D) {
        self.0.insert(TypeId::of::<D>(), Box::new(data));
    }

    pub(crate) fn get<D: Any + Send + Sync>(&self) -> Option<&D> {
        self.0.get(&TypeId::of::<D>()).and_then(|d| d.downcast_ref::<D>())
    }
}

impl Debug for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Data").finish()
    }
}

#[doc(hidden)]
#[derive(Debug)]
pub struct SchemaEnvInner {
    pub registry: Registry,
    pub data: Data,
    /// Field definitions for the reserved `__schema` and `__type` fields,
    /// kept outside the query root so introspection doesn't list them.
    pub introspection: crate::resolver_utils::IntrospectionRoot,
}

#[doc(hidden)]
#[derive(Clone, Debug)]
pub struct SchemaEnv(Arc<SchemaEnvInner>);

impl SchemaEnv {
    pub fn new(inner: SchemaEnvInner) -> Self {
        SchemaEnv(Arc::new(inner))
    }
}

impl Deref for SchemaEnv {
    type Target = SchemaEnvInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[doc(hidden)]
pub struct QueryEnvInner {
    pub operation: Positioned<OperationDefinition>,
    pub operation_name: Option<String>,
    pub fragments: HashMap<Name, Positioned<FragmentDefinition>>,
    pub variables: Variables,
    pub root_value: ConstValue,
    pub ctx_data: Arc<Data>,
    pub introspection_enabled: bool,
    pub field_resolver: Option<BoxResolverFn>,
    pub type_resolver: Option<ResolveTypeFn>,
    pub subscribe_field_resolver: Option<BoxResolverFn>,
    /// A sender for deferred workloads (used by `@defer` & `@stream`).
    ///
    /// This is set to `None` when the caller uses a surface that doesn't
    /// support incremental delivery. In these circumstances no workload is
    /// deferred and the data is returned as part of the main response.
    pub deferred_workloads: Option<DeferredWorkloadSender>,
    pub execution_id: Ulid,
}

#[doc(hidden)]
#[derive(Clone)]
pub struct QueryEnv(Arc<QueryEnvInner>);

impl Deref for QueryEnv {
    type Target = QueryEnvInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl QueryEnv {
    #[doc(hidden)]
    pub fn new(inner: QueryEnvInner) -> QueryEnv {
        QueryEnv(Arc::new(inner))
    }
}

pub struct QueryEnvBuilder(QueryEnvInner);

impl QueryEnvBuilder {
    pub fn new(inner: QueryEnvInner) -> Self {
        Self(inner)
    }

    pub fn operation_type(&self) -> crate::parser::types::OperationType {
        self.0.operation.node.ty
    }

    pub fn with_deferred_sender(mut self, sender: DeferredWorkloadSender) -> Self {
        self.0.deferred_workloads = Some(sender);
        self
    }

    pub fn build(self) -> QueryEnv {
        QueryEnv::new(self.0)
    }
}

/// The error log and payload ordering of the response part currently being
/// built: the primary response, one deferred fragment, or one streamed item.
///
/// Errors raised while executing under a deferred or streamed payload attach
/// to that payload rather than the primary response; the scope is what makes
/// that choice, selected at the point the payload's execution begins.
pub struct ExecutionScope {
    errors: Mutex<Vec<ServerError>>,
    /// Completion signal of this payload's data. Workloads registered under
    /// this scope are sequenced after it so a child patch is never yielded
    /// before its parent.
    pub(crate) ordering: Option<PayloadOrdering>,
    /// Response path at which this scope is rooted. Error paths and child
    /// workload paths are prefixed with it.
    pub(crate) base_path: Vec<PathSegment>,
}

impl ExecutionScope {
    pub(crate) fn new(ordering: Option<PayloadOrdering>, base_path: Vec<PathSegment>) -> Self {
        ExecutionScope {
            errors: Mutex::new(Vec::new()),
            ordering,
            base_path,
        }
    }

    pub(crate) fn push_error(&self, error: ServerError) {
        self.errors.lock().expect("error log poisoned").push(error);
    }

    pub(crate) fn take_errors(&self) -> Vec<ServerError> {
        std::mem::take(&mut *self.errors.lock().expect("error log poisoned"))
    }
}

impl Default for ExecutionScope {
    fn default() -> Self {
        ExecutionScope::new(None, Vec::new())
    }
}

/// Shared accessors of the per-selection-set and per-field contexts.
pub trait Context<'a> {
    fn path_node(&self) -> Option<&QueryPathNode<'a>>;
    fn query_env(&self) -> &'a QueryEnv;
    fn schema_env(&self) -> &'a SchemaEnv;
    fn scope(&self) -> &'a ExecutionScope;
}

/// Extension trait that defines shared behaviour for
/// [`ContextSelectionSet`] & [`ContextField`].
pub trait ContextExt<'a>: Context<'a> {
    fn registry(&self) -> &'a Registry {
        &self.schema_env().registry
    }

    fn deferred_workloads(&self) -> Option<&'a DeferredWorkloadSender> {
        self.query_env().deferred_workloads.as_ref()
    }

    /// Find a fragment definition by name.
    fn get_fragment(&self, name: &str) -> Option<&'a Positioned<FragmentDefinition>> {
        self.query_env().fragments.get(name)
    }

    /// Find a type definition by name.
    fn get_type(&self, name: &str) -> Option<&'a MetaType> {
        self.schema_env().registry.lookup_type(name)
    }

    /// The full response path to the current position, from the response
    /// root, crossing incremental-payload boundaries.
    fn response_path(&self) -> Vec<PathSegment> {
        let mut path = self.scope().base_path.clone();
        if let Some(node) = self.path_node() {
            path.extend(node.to_path());
        }
        path
    }

    /// Stamp the current response path onto an error that doesn't carry one
    /// yet.
    fn set_error_path(&self, error: ServerError) -> ServerError {
        if !error.path.is_empty() {
            // If the error already has a path we don't want to overwrite it.
            return error;
        }

        ServerError {
            path: self.response_path(),
            ..error
        }
    }

    /// Report a resolver error to the active error log.
    fn add_error(&self, error: ServerError) {
        self.scope().push_error(error);
    }

    /// Gets the global data defined in the request or the schema.
    ///
    /// # Errors
    ///
    /// Returns an `Error` if the specified type data does not exist.
    fn data<D: Any + Send + Sync>(&self) -> Result<&'a D> {
        self.data_opt::<D>()
            .ok_or_else(|| Error::new(format!("Data `{}` does not exist.", std::any::type_name::<D>())))
    }

    /// Gets the global data defined in the request or the schema, or `None`
    /// if the specified type data does not exist.
    fn data_opt<D: Any + Send + Sync>(&self) -> Option<&'a D> {
        self.query_env()
            .ctx_data
            .get::<D>()
            .or_else(|| self.schema_env().data.get::<D>())
    }

    /// The value of the variable with the given name, falling back to the
    /// declared default.
    fn var_value(&self, name: &str, pos: Pos) -> ServerResult<ConstValue> {
        self.query_env()
            .operation
            .node
            .variable_definitions
            .iter()
            .find(|def| def.node.name.node == name)
            .and_then(|def| {
                self.query_env()
                    .variables
                    .get(&def.node.name.node)
                    .or_else(|| def.node.default_value())
            })
            .cloned()
            .ok_or_else(|| ServerError::new(format!("Variable {name} is not defined."), Some(pos)))
    }

    /// Resolve an input value from the document, replacing any variable
    /// references with their values.
    fn resolve_input_value(&self, value: Positioned<Value>) -> ServerResult<ConstValue> {
        let pos = value.pos;
        value.node.into_const_with(|name| self.var_value(&name, pos))
    }
}

impl<'a, T> ContextExt<'a> for T where T: Context<'a> + ?Sized {}

/// Context when resolving the selection set of a concrete object type.
#[derive(Clone)]
pub struct ContextSelectionSet<'a> {
    /// The concrete type whose selection set is being executed.
    pub ty: &'a ObjectType,
    /// The current path being resolved.
    pub path_node: Option<QueryPathNode<'a>>,
    /// The selection set being resolved.
    pub item: &'a Positioned<SelectionSet>,
    /// Context scoped to the current schema.
    pub schema_env: &'a SchemaEnv,
    /// Context scoped to the current query.
    pub query_env: &'a QueryEnv,
    /// The response part under construction.
    pub scope: &'a ExecutionScope,
}

impl<'a> ContextSelectionSet<'a> {
    /// Enter a field of this selection set.
    ///
    /// `nodes` are all the field nodes grouped under one response name; the
    /// first is the one arguments are read from.
    pub fn with_field(
        &'a self,
        nodes: &'a [&'a Positioned<Field>],
        field: &'a MetaField,
    ) -> ContextField<'a> {
        let first = nodes[0];
        ContextField {
            parent_type: self.ty,
            field,
            item: first,
            nodes,
            path_node: Some(QueryPathNode {
                parent: self.path_node.as_ref(),
                segment: QueryPathSegment::Name(first.node.response_key().node.as_str()),
                type_name: Some(self.ty.name.as_str()),
            }),
            schema_env: self.schema_env,
            query_env: self.query_env,
            scope: self.scope,
        }
    }

    /// The same selection set under a different concrete type, used when a
    /// fragment narrows an abstract type.
    pub fn with_type(&self, ty: &'a ObjectType) -> ContextSelectionSet<'a> {
        ContextSelectionSet {
            ty,
            path_node: self.path_node,
            item: self.item,
            schema_env: self.schema_env,
            query_env: self.query_env,
            scope: self.scope,
        }
    }
}

impl<'a> Context<'a> for ContextSelectionSet<'a> {
    fn path_node(&self) -> Option<&QueryPathNode<'a>> {
        self.path_node.as_ref()
    }

    fn query_env(&self) -> &'a QueryEnv {
        self.query_env
    }

    fn schema_env(&self) -> &'a SchemaEnv {
        self.schema_env
    }

    fn scope(&self) -> &'a ExecutionScope {
        self.scope
    }
}

impl Debug for ContextSelectionSet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSelectionSet")
            .field("type", &self.ty.name)
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}

/// Context when resolving one grouped field.
#[derive(Clone)]
pub struct ContextField<'a> {
    /// The object type the field belongs to.
    pub parent_type: &'a ObjectType,
    /// The schema definition of the field.
    pub field: &'a MetaField,
    /// The primary field node: the first one grouped under this response
    /// name. Arguments and directives are read from it.
    pub item: &'a Positioned<Field>,
    /// All field nodes grouped under this response name.
    pub nodes: &'a [&'a Positioned<Field>],
    /// The current path, terminating at this field's response name. `None`
    /// when the field sits at the root of an incremental payload, whose path
    /// lives on the scope instead.
    pub path_node: Option<QueryPathNode<'a>>,
    pub schema_env: &'a SchemaEnv,
    pub query_env: &'a QueryEnv,
    pub scope: &'a ExecutionScope,
}

impl<'a> ContextField<'a> {
    /// The response name of this field.
    pub fn response_key(&self) -> &'a Name {
        &self.item.node.response_key().node
    }

    /// Extend the path with a list index, for completing one list element.
    pub fn path_with_index(&'a self, index: usize) -> QueryPathNode<'a> {
        QueryPathNode {
            parent: self.path_node.as_ref(),
            segment: QueryPathSegment::Index(index),
            type_name: None,
        }
    }

    /// The selection sets of every node grouped under this response name.
    pub fn selection_sets(&self) -> impl Iterator<Item = &'a Positioned<SelectionSet>> + '_ {
        self.nodes.iter().map(|node| &node.node.selection_set)
    }
}

impl<'a> Context<'a> for ContextField<'a> {
    fn path_node(&self) -> Option<&QueryPathNode<'a>> {
        self.path_node.as_ref()
    }

    fn query_env(&self) -> &'a QueryEnv {
        self.query_env
    }

    fn schema_env(&self) -> &'a SchemaEnv {
        self.schema_env
    }

    fn scope(&self) -> &'a ExecutionScope {
        self.scope
    }
}

impl Debug for ContextField<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextField")
            .field("parent_type", &self.parent_type.name)
            .field("field", &self.field.name)
            .field("path", &self.path_node.as_ref().map(ToString::to_string))
            .finish_non_exhaustive()
    }
}
