//! Runtime-type resolution for interfaces and unions.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use deltaql::{
    registry::{InterfaceType, MetaField, ObjectType, Registry, UnionType},
    value, Schema, TypeResolutionContext,
};
use futures::FutureExt;
use integration_tests::{resolves_to, runtime, ResponseExt};
use serde_json::json;

fn node_registry() -> Registry {
    let mut registry = Registry::new();
    registry.insert_type(InterfaceType::new("Node", [MetaField::new("id", "ID!")]));
    registry.insert_type(
        ObjectType::new(
            "User",
            [MetaField::new("id", "ID!"), MetaField::new("name", "String")],
        )
        .implement("Node"),
    );
    registry.insert_type(
        ObjectType::new(
            "Droid",
            [MetaField::new("id", "ID!"), MetaField::new("designation", "String")],
        )
        .implement("Node"),
    );
    registry
}

#[test]
fn interfaces_default_to_the_typename_property() {
    runtime().block_on(async {
        let mut registry = node_registry();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("node", "Node").resolve_with(resolves_to(value!({
                "__typename": "User",
                "name": "Ada",
            })))],
        ));
        let response = Schema::new(registry)
            .execute("{ node { ... on User { name } } }")
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "node": { "name": "Ada" } } }));
    });
}

#[test]
fn interface_fields_resolve_on_the_concrete_type() {
    runtime().block_on(async {
        let mut registry = node_registry();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("node", "Node").resolve_with(resolves_to(value!({
                "__typename": "Droid",
                "id": "d-1",
                "designation": "R2",
            })))],
        ));
        let response = Schema::new(registry)
            .execute("{ node { id __typename ... on User { name } ... on Droid { designation } } }")
            .await
            .assert_success();
        assert_eq!(
            response.into_value(),
            json!({ "data": { "node": {
                "id": "d-1",
                "__typename": "Droid",
                "designation": "R2",
            } } })
        );
    });
}

#[test]
fn a_custom_resolve_type_takes_precedence() {
    runtime().block_on(async {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        let mut registry = node_registry();
        registry.insert_type(
            InterfaceType::new("Node", [MetaField::new("id", "ID!")]).with_resolve_type(
                move |_ctx: TypeResolutionContext<'_>| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(Some("User".to_string())) }.boxed()
                },
            ),
        );
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("node", "Node").resolve_with(resolves_to(value!({ "name": "Ada" })))],
        ));

        let response = Schema::new(registry)
            .execute("{ node { ... on User { name } } }")
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "node": { "name": "Ada" } } }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn unions_scan_is_type_of_in_declaration_order() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(UnionType::new("Pet", ["Dog", "Cat"]));
        registry.insert_type(
            ObjectType::new("Dog", [MetaField::new("barks", "Boolean")]).with_is_type_of(|value| {
                let is_dog = matches!(value, deltaql::Value::Object(obj) if obj.contains_key("barks"));
                async move { is_dog }.boxed()
            }),
        );
        registry.insert_type(
            ObjectType::new("Cat", [MetaField::new("meows", "Boolean")]).with_is_type_of(|value| {
                let is_cat = matches!(value, deltaql::Value::Object(obj) if obj.contains_key("meows"));
                async move { is_cat }.boxed()
            }),
        );
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("pet", "Pet").resolve_with(resolves_to(value!({ "meows": true })))],
        ));

        let response = Schema::new(registry)
            .execute("{ pet { ... on Dog { barks } ... on Cat { meows } } }")
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "pet": { "meows": true } } }));
    });
}

#[test]
fn unresolvable_abstract_values_error() {
    runtime().block_on(async {
        let mut registry = node_registry();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("node", "Node").resolve_with(resolves_to(value!({ "name": "Ada" })))],
        ));
        let response = Schema::new(registry)
            .execute("{ node { ... on User { name } } }")
            .await;

        assert_eq!(
            response.errors[0].message,
            r#"Abstract type "Node" must resolve to an Object type at runtime for field "Query.node". Either the "Node" type should provide a "resolve_type" function or each possible type should provide an "is_type_of" function."#
        );
        assert_eq!(response.into_value()["data"], json!({ "node": null }));
    });
}

#[test]
fn runtime_types_must_be_possible_types() {
    runtime().block_on(async {
        let mut registry = node_registry();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("node", "Node").resolve_with(resolves_to(value!({
                "__typename": "Query",
            })))],
        ));
        let response = Schema::new(registry)
            .execute("{ node { ... on User { name } } }")
            .await;

        assert_eq!(
            response.errors[0].message,
            r#"Runtime Object type "Query" is not a possible type for "Node"."#
        );
    });
}

#[test]
fn runtime_types_must_exist() {
    runtime().block_on(async {
        let mut registry = node_registry();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("node", "Node").resolve_with(resolves_to(value!({
                "__typename": "Ghost",
            })))],
        ));
        let response = Schema::new(registry)
            .execute("{ node { ... on User { name } } }")
            .await;

        assert_eq!(
            response.errors[0].message,
            r#"Abstract type "Node" was resolved to a type "Ghost" that does not exist inside the schema."#
        );
    });
}

#[test]
fn is_type_of_guards_object_completion() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("dog", "Dog").resolve_with(resolves_to(value!({ "meows": true })))],
        ));
        registry.insert_type(
            ObjectType::new("Dog", [MetaField::new("barks", "Boolean")]).with_is_type_of(|value| {
                let is_dog = matches!(value, deltaql::Value::Object(obj) if obj.contains_key("barks"));
                async move { is_dog }.boxed()
            }),
        );
        let response = Schema::new(registry).execute("{ dog { barks } }").await;

        assert!(response.errors[0]
            .message
            .starts_with(r#"Expected value of type "Dog" but got"#));
        assert_eq!(response.into_value()["data"], json!({ "dog": null }));
    });
}
