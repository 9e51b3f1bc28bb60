//! The read-only schema model the executor runs against.
//!
//! A [`Registry`] holds every named type of a schema keyed by name, plus the
//! names of the root operation types. The executor only ever reads from it;
//! building one (from SDL, introspection or by hand) is the concern of the
//! caller.

pub mod resolvers;

mod type_names;

use std::collections::{BTreeMap, HashMap, HashSet};

use async_graphql_value::ConstValue;
use indexmap::{IndexMap, IndexSet};

pub use type_names::{InputValueType, MetaFieldType, MetaTypeName};

use self::resolvers::{
    BoxResolverFn, FieldFuture, IsTypeOfFn, ResolveTypeFn, ResolverContext, ScalarSerializeFn,
    TypeResolutionContext,
};

/// An input value taken by a field or a directive.
#[derive(derivative::Derivative, Clone)]
#[derivative(Debug)]
pub struct MetaInputValue {
    pub name: String,
    pub description: Option<String>,
    pub ty: InputValueType,
    pub default_value: Option<ConstValue>,
}

impl MetaInputValue {
    pub fn new(name: impl Into<String>, ty: impl Into<InputValueType>) -> MetaInputValue {
        MetaInputValue {
            name: name.into(),
            description: None,
            ty: ty.into(),
            default_value: None,
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> MetaInputValue {
        MetaInputValue {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn with_default(self, default: ConstValue) -> MetaInputValue {
        MetaInputValue {
            default_value: Some(default),
            ..self
        }
    }
}

/// Deprecation state of a field or enum value.
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq)]
pub enum Deprecation {
    #[default]
    NoDeprecated,
    Deprecated {
        reason: Option<String>,
    },
}

impl Deprecation {
    #[inline]
    pub fn is_deprecated(&self) -> bool {
        matches!(self, Deprecation::Deprecated { .. })
    }

    #[inline]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Deprecation::NoDeprecated => None,
            Deprecation::Deprecated { reason } => reason.as_deref(),
        }
    }
}

/// A field of an object or interface type.
#[derive(derivative::Derivative, Clone, Default)]
#[derivative(Debug)]
pub struct MetaField {
    pub name: String,
    /// The name the field resolves to on the source value, when it differs
    /// from the schema name.
    pub mapped_name: Option<String>,
    pub description: Option<String>,
    pub args: IndexMap<String, MetaInputValue>,
    pub ty: MetaFieldType,
    pub deprecation: Deprecation,
    #[derivative(Debug = "ignore")]
    pub resolver: Option<BoxResolverFn>,
}

impl MetaField {
    pub fn new(name: impl Into<String>, ty: impl Into<MetaFieldType>) -> MetaField {
        MetaField {
            name: name.into(),
            ty: ty.into(),
            ..Default::default()
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn with_deprecation(self, deprecation: Deprecation) -> Self {
        Self { deprecation, ..self }
    }

    pub fn with_mapped_name(self, mapped_name: impl Into<String>) -> Self {
        Self {
            mapped_name: Some(mapped_name.into()),
            ..self
        }
    }

    pub fn argument(mut self, input: MetaInputValue) -> Self {
        self.args.insert(input.name.clone(), input);
        self
    }

    /// Attach a resolver to this field.
    pub fn resolve_with<F>(mut self, resolver: F) -> Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        self.resolver = Some(std::sync::Arc::new(resolver));
        self
    }

    /// The name of this field on the source value.
    pub fn target_field_name(&self) -> &str {
        self.mapped_name.as_deref().unwrap_or(&self.name)
    }
}

/// A value of an enum type.
#[derive(Debug, Clone)]
pub struct MetaEnumValue {
    pub name: String,
    pub description: Option<String>,
    pub deprecation: Deprecation,
}

impl MetaEnumValue {
    pub fn new(name: impl Into<String>) -> Self {
        MetaEnumValue {
            name: name.into(),
            description: None,
            deprecation: Deprecation::NoDeprecated,
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn with_deprecation(self, deprecation: Deprecation) -> Self {
        Self { deprecation, ..self }
    }
}

#[derive(derivative::Derivative, Clone)]
#[derivative(Debug)]
pub struct ScalarType {
    pub name: String,
    pub description: Option<String>,
    pub specified_by_url: Option<String>,
    /// Validation hook for pass-through serialization.
    #[derivative(Debug = "ignore")]
    pub is_valid: Option<fn(value: &ConstValue) -> bool>,
    /// Serialization hook. When absent the resolved value passes through.
    #[derivative(Debug = "ignore")]
    pub serialize: Option<ScalarSerializeFn>,
}

impl ScalarType {
    pub fn new(name: impl Into<String>) -> Self {
        ScalarType {
            name: name.into(),
            description: None,
            specified_by_url: None,
            is_valid: None,
            serialize: None,
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn with_validator(self, is_valid: fn(value: &ConstValue) -> bool) -> Self {
        Self {
            is_valid: Some(is_valid),
            ..self
        }
    }

    pub fn with_serializer<F>(mut self, serialize: F) -> Self
    where
        F: Fn(ConstValue) -> crate::Result<ConstValue> + Send + Sync + 'static,
    {
        self.serialize = Some(std::sync::Arc::new(serialize));
        self
    }
}

#[derive(derivative::Derivative, Clone)]
#[derivative(Debug)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, MetaField>,
    /// Names of the interfaces this object implements.
    pub implements: IndexSet<String>,
    #[derivative(Debug = "ignore")]
    pub is_type_of: Option<IsTypeOfFn>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = MetaField>) -> ObjectType {
        ObjectType {
            name: name.into(),
            description: None,
            fields: fields
                .into_iter()
                .map(|field| (field.name.clone(), field))
                .collect(),
            implements: Default::default(),
            is_type_of: None,
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn implement(mut self, interface: impl Into<String>) -> Self {
        self.implements.insert(interface.into());
        self
    }

    pub fn with_is_type_of<F>(mut self, is_type_of: F) -> Self
    where
        F: for<'a> Fn(&'a ConstValue) -> futures_util::future::BoxFuture<'a, bool> + Send + Sync + 'static,
    {
        self.is_type_of = Some(std::sync::Arc::new(is_type_of));
        self
    }

    #[inline]
    pub fn field_by_name(&self, name: &str) -> Option<&MetaField> {
        self.fields.get(name)
    }
}

#[derive(derivative::Derivative, Clone)]
#[derivative(Debug)]
pub struct InterfaceType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, MetaField>,
    /// Names of the object types implementing this interface, in declaration
    /// order.
    pub possible_types: IndexSet<String>,
    #[derivative(Debug = "ignore")]
    pub resolve_type: Option<ResolveTypeFn>,
}

impl InterfaceType {
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = MetaField>) -> Self {
        InterfaceType {
            name: name.into(),
            description: None,
            fields: fields
                .into_iter()
                .map(|field| (field.name.clone(), field))
                .collect(),
            possible_types: Default::default(),
            resolve_type: None,
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn with_possible_types<T: Into<String>>(mut self, types: impl IntoIterator<Item = T>) -> Self {
        self.possible_types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn with_resolve_type<F>(mut self, resolve_type: F) -> Self
    where
        F: for<'a> Fn(TypeResolutionContext<'a>) -> futures_util::future::BoxFuture<'a, crate::Result<Option<String>>>
            + Send
            + Sync
            + 'static,
    {
        self.resolve_type = Some(std::sync::Arc::new(resolve_type));
        self
    }

    pub fn field_by_name(&self, name: &str) -> Option<&MetaField> {
        self.fields.get(name)
    }
}

#[derive(derivative::Derivative, Clone)]
#[derivative(Debug)]
pub struct UnionType {
    pub name: String,
    pub description: Option<String>,
    /// Names of the member object types, in declaration order.
    pub possible_types: IndexSet<String>,
    #[derivative(Debug = "ignore")]
    pub resolve_type: Option<ResolveTypeFn>,
}

impl UnionType {
    pub fn new<T: Into<String>>(name: impl Into<String>, possible_types: impl IntoIterator<Item = T>) -> UnionType {
        UnionType {
            name: name.into(),
            description: None,
            possible_types: possible_types.into_iter().map(Into::into).collect(),
            resolve_type: None,
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn with_resolve_type<F>(mut self, resolve_type: F) -> Self
    where
        F: for<'a> Fn(TypeResolutionContext<'a>) -> futures_util::future::BoxFuture<'a, crate::Result<Option<String>>>
            + Send
            + Sync
            + 'static,
    {
        self.resolve_type = Some(std::sync::Arc::new(resolve_type));
        self
    }
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub description: Option<String>,
    pub enum_values: IndexMap<String, MetaEnumValue>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = MetaEnumValue>) -> Self {
        EnumType {
            name: name.into(),
            description: None,
            enum_values: values
                .into_iter()
                .map(|value| (value.name.clone(), value))
                .collect(),
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn value(&self, name: &str) -> Option<&MetaEnumValue> {
        self.enum_values.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct InputObjectType {
    pub name: String,
    pub description: Option<String>,
    pub input_fields: IndexMap<String, MetaInputValue>,
}

impl InputObjectType {
    pub fn new(name: impl Into<String>, input_fields: impl IntoIterator<Item = MetaInputValue>) -> Self {
        InputObjectType {
            name: name.into(),
            description: None,
            input_fields: input_fields
                .into_iter()
                .map(|value| (value.name.clone(), value))
                .collect(),
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }
}

/// The kind of a type, used in error messages and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl TypeKind {
    pub fn introspection_name(self) -> &'static str {
        match self {
            TypeKind::Scalar => "SCALAR",
            TypeKind::Object => "OBJECT",
            TypeKind::Interface => "INTERFACE",
            TypeKind::Union => "UNION",
            TypeKind::Enum => "ENUM",
            TypeKind::InputObject => "INPUT_OBJECT",
        }
    }
}

/// A named type of the schema.
#[derive(Debug, Clone)]
pub enum MetaType {
    Scalar(ScalarType),
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
    Enum(EnumType),
    InputObject(InputObjectType),
}

impl MetaType {
    pub fn name(&self) -> &str {
        match self {
            MetaType::Scalar(inner) => &inner.name,
            MetaType::Object(inner) => &inner.name,
            MetaType::Interface(inner) => &inner.name,
            MetaType::Union(inner) => &inner.name,
            MetaType::Enum(inner) => &inner.name,
            MetaType::InputObject(inner) => &inner.name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            MetaType::Scalar(inner) => inner.description.as_deref(),
            MetaType::Object(inner) => inner.description.as_deref(),
            MetaType::Interface(inner) => inner.description.as_deref(),
            MetaType::Union(inner) => inner.description.as_deref(),
            MetaType::Enum(inner) => inner.description.as_deref(),
            MetaType::InputObject(inner) => inner.description.as_deref(),
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            MetaType::Scalar(_) => TypeKind::Scalar,
            MetaType::Object(_) => TypeKind::Object,
            MetaType::Interface(_) => TypeKind::Interface,
            MetaType::Union(_) => TypeKind::Union,
            MetaType::Enum(_) => TypeKind::Enum,
            MetaType::InputObject(_) => TypeKind::InputObject,
        }
    }

    pub fn object(&self) -> Option<&ObjectType> {
        match self {
            MetaType::Object(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, MetaType::Object(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, MetaType::Interface(_) | MetaType::Union(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, MetaType::Scalar(_) | MetaType::Enum(_))
    }

    pub fn is_input(&self) -> bool {
        matches!(
            self,
            MetaType::Scalar(_) | MetaType::Enum(_) | MetaType::InputObject(_)
        )
    }

    /// Fields of an object or interface type.
    pub fn fields(&self) -> Option<&IndexMap<String, MetaField>> {
        match self {
            MetaType::Object(inner) => Some(&inner.fields),
            MetaType::Interface(inner) => Some(&inner.fields),
            _ => None,
        }
    }

    pub fn field_by_name(&self, name: &str) -> Option<&MetaField> {
        self.fields().and_then(|fields| fields.get(name))
    }

    /// The possible concrete types of an abstract type, in declaration order.
    pub fn possible_types(&self) -> Option<&IndexSet<String>> {
        match self {
            MetaType::Interface(inner) => Some(&inner.possible_types),
            MetaType::Union(inner) => Some(&inner.possible_types),
            _ => None,
        }
    }

    pub fn resolve_type_fn(&self) -> Option<&ResolveTypeFn> {
        match self {
            MetaType::Interface(inner) => inner.resolve_type.as_ref(),
            MetaType::Union(inner) => inner.resolve_type.as_ref(),
            _ => None,
        }
    }
}

impl From<ScalarType> for MetaType {
    fn from(val: ScalarType) -> Self {
        MetaType::Scalar(val)
    }
}

impl From<ObjectType> for MetaType {
    fn from(val: ObjectType) -> Self {
        MetaType::Object(val)
    }
}

impl From<InterfaceType> for MetaType {
    fn from(val: InterfaceType) -> Self {
        MetaType::Interface(val)
    }
}

impl From<UnionType> for MetaType {
    fn from(val: UnionType) -> Self {
        MetaType::Union(val)
    }
}

impl From<EnumType> for MetaType {
    fn from(val: EnumType) -> Self {
        MetaType::Enum(val)
    }
}

impl From<InputObjectType> for MetaType {
    fn from(val: InputObjectType) -> Self {
        MetaType::InputObject(val)
    }
}

/// Locations a directive may appear in, as exposed by introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum DirectiveLocation {
    QUERY,
    MUTATION,
    SUBSCRIPTION,
    FIELD,
    FRAGMENT_DEFINITION,
    FRAGMENT_SPREAD,
    INLINE_FRAGMENT,
    VARIABLE_DEFINITION,
    SCHEMA,
    SCALAR,
    OBJECT,
    FIELD_DEFINITION,
    ARGUMENT_DEFINITION,
    INTERFACE,
    UNION,
    ENUM,
    ENUM_VALUE,
    INPUT_OBJECT,
    INPUT_FIELD_DEFINITION,
}

impl DirectiveLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            DirectiveLocation::QUERY => "QUERY",
            DirectiveLocation::MUTATION => "MUTATION",
            DirectiveLocation::SUBSCRIPTION => "SUBSCRIPTION",
            DirectiveLocation::FIELD => "FIELD",
            DirectiveLocation::FRAGMENT_DEFINITION => "FRAGMENT_DEFINITION",
            DirectiveLocation::FRAGMENT_SPREAD => "FRAGMENT_SPREAD",
            DirectiveLocation::INLINE_FRAGMENT => "INLINE_FRAGMENT",
            DirectiveLocation::VARIABLE_DEFINITION => "VARIABLE_DEFINITION",
            DirectiveLocation::SCHEMA => "SCHEMA",
            DirectiveLocation::SCALAR => "SCALAR",
            DirectiveLocation::OBJECT => "OBJECT",
            DirectiveLocation::FIELD_DEFINITION => "FIELD_DEFINITION",
            DirectiveLocation::ARGUMENT_DEFINITION => "ARGUMENT_DEFINITION",
            DirectiveLocation::INTERFACE => "INTERFACE",
            DirectiveLocation::UNION => "UNION",
            DirectiveLocation::ENUM => "ENUM",
            DirectiveLocation::ENUM_VALUE => "ENUM_VALUE",
            DirectiveLocation::INPUT_OBJECT => "INPUT_OBJECT",
            DirectiveLocation::INPUT_FIELD_DEFINITION => "INPUT_FIELD_DEFINITION",
        }
    }
}

/// A directive definition, as exposed by introspection.
#[derive(Debug, Clone)]
pub struct MetaDirective {
    pub name: String,
    pub description: Option<String>,
    pub locations: Vec<DirectiveLocation>,
    pub args: IndexMap<String, MetaInputValue>,
    pub is_repeatable: bool,
}

impl MetaDirective {
    pub fn new(name: impl Into<String>, locations: Vec<DirectiveLocation>) -> Self {
        MetaDirective {
            name: name.into(),
            description: None,
            locations,
            args: Default::default(),
            is_repeatable: false,
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn argument(mut self, input: MetaInputValue) -> Self {
        self.args.insert(input.name.clone(), input);
        self
    }
}

/// All the named types of a schema, plus its root operation types.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub types: BTreeMap<String, MetaType>,
    pub directives: IndexMap<String, MetaDirective>,
    /// Maps a type name to the names of the interfaces it implements.
    pub implements: HashMap<String, HashSet<String>>,
    pub query_type: String,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub disable_introspection: bool,
}

impl Registry {
    /// An empty registry with an empty `Query` root type.
    pub fn new() -> Registry {
        let mut registry = Registry {
            query_type: "Query".to_string(),
            ..Registry::default()
        };
        registry.insert_type(ObjectType::new("Query", []));
        registry
    }

    /// Insert a type, keyed by its name. Replaces any previous type of that
    /// name.
    pub fn insert_type(&mut self, ty: impl Into<MetaType>) {
        let ty = ty.into();
        if let MetaType::Object(object) = &ty {
            if !object.implements.is_empty() {
                self.implements
                    .entry(object.name.clone())
                    .or_default()
                    .extend(object.implements.iter().cloned());
            }
        }
        self.types.insert(ty.name().to_string(), ty);
    }

    /// Looks up a type by its name, without any list or non-null wrappers.
    pub fn lookup_type(&self, name: &str) -> Option<&MetaType> {
        self.types.get(name)
    }

    pub fn query_root(&self) -> &MetaType {
        self.types
            .get(&self.query_type)
            .expect("the registry to contain its query root")
    }

    /// The root type for an operation, if the schema is configured for it.
    pub fn root_type(&self, operation_type: async_graphql_parser::types::OperationType) -> Option<&MetaType> {
        use async_graphql_parser::types::OperationType;
        match operation_type {
            OperationType::Query => Some(self.query_root()),
            OperationType::Mutation => self.mutation_type.as_deref().and_then(|name| self.types.get(name)),
            OperationType::Subscription => self
                .subscription_type
                .as_deref()
                .and_then(|name| self.types.get(name)),
        }
    }

    /// Whether `object_name` is a possible runtime type of the abstract type
    /// `abstract_name`.
    pub fn is_possible_type(&self, abstract_name: &str, object_name: &str) -> bool {
        match self.types.get(abstract_name) {
            Some(ty) if ty.is_abstract() => ty
                .possible_types()
                .map_or(false, |possible| possible.contains(object_name)),
            _ => false,
        }
    }

    /// Whether a type condition is satisfied by the concrete type
    /// `type_name`: the condition names the type itself, an interface it
    /// implements, or a union it is a member of.
    pub fn type_condition_matches(&self, condition: &str, type_name: &str) -> bool {
        if condition == type_name {
            return true;
        }
        if self
            .implements
            .get(type_name)
            .map_or(false, |interfaces| interfaces.contains(condition))
        {
            return true;
        }
        self.is_possible_type(condition, type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> Registry {
        let mut registry = Registry::new();
        registry.insert_type(InterfaceType::new("Node", [MetaField::new("id", "ID!")]).with_possible_types(["User"]));
        registry.insert_type(
            ObjectType::new(
                "User",
                [MetaField::new("id", "ID!"), MetaField::new("name", "String")],
            )
            .implement("Node"),
        );
        registry.insert_type(UnionType::new("SearchResult", ["User"]));
        registry
    }

    #[test]
    fn type_condition_matching() {
        let registry = sample_registry();
        assert!(registry.type_condition_matches("User", "User"));
        assert!(registry.type_condition_matches("Node", "User"));
        assert!(registry.type_condition_matches("SearchResult", "User"));
        assert!(!registry.type_condition_matches("User", "Query"));
        assert!(!registry.type_condition_matches("Missing", "User"));
    }

    #[test]
    fn possible_types_follow_declaration_and_linking() {
        let registry = sample_registry();
        assert!(registry.is_possible_type("Node", "User"));
        assert!(registry.is_possible_type("SearchResult", "User"));
        // Only abstract types have possible types.
        assert!(!registry.is_possible_type("User", "User"));
        assert!(registry.lookup_type("Ghost").is_none());
    }
}
