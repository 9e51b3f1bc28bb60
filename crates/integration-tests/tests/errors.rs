//! Field errors: location, path, nullable absorption and non-null bubbling.

use deltaql::{
    registry::{MetaField, ObjectType, Registry},
    value, FieldFuture, PathSegment, ResolverContext, Schema,
};
use integration_tests::{fails_with, resolves_to, runtime, ResponseExt};
use serde_json::json;

#[test]
fn a_failed_nullable_field_nulls_out_in_place() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [
                MetaField::new("a", "Int").resolve_with(resolves_to(value!(1))),
                MetaField::new("b", "Int").resolve_with(fails_with("boom")),
            ],
        ));
        let response = Schema::new(registry).execute("{ a b }").await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "boom");
        assert_eq!(response.errors[0].path, vec![PathSegment::Field("b".to_string())]);
        assert!(!response.errors[0].locations.is_empty());
        assert_eq!(response.into_value()["data"], json!({ "a": 1, "b": null }));
    });
}

#[test]
fn a_null_for_a_non_null_field_nulls_the_root() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("x", "Int!").resolve_with(resolves_to(value!(null)))],
        ));
        let response = Schema::new(registry).execute("{ x }").await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].message,
            "Cannot return null for non-nullable field Query.x."
        );
        assert_eq!(response.errors[0].path, vec![PathSegment::Field("x".to_string())]);
        assert_eq!(response.into_value(), json!({ "data": null, "errors": [{
            "locations": [{ "column": 3, "line": 1 }],
            "message": "Cannot return null for non-nullable field Query.x.",
            "path": ["x"],
        }] }));
    });
}

#[test]
fn a_null_list_item_bubbles_through_non_null_wrappers() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("items", "[Int!]!").resolve_with(resolves_to(value!([1, null, 3])))],
        ));
        let response = Schema::new(registry).execute("{ items }").await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].message,
            "Cannot return null for non-nullable field Query.items."
        );
        assert_eq!(
            response.errors[0].path,
            vec![PathSegment::Field("items".to_string()), PathSegment::Index(1)]
        );
        assert_eq!(response.into_value()["data"], json!(null));
    });
}

#[test]
fn nullable_list_items_null_out_in_place() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("items", "[Int]").resolve_with(resolves_to(value!([1, "not an int", 3])))],
        ));
        let response = Schema::new(registry).execute("{ items }").await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].path,
            vec![PathSegment::Field("items".to_string()), PathSegment::Index(1)]
        );
        assert_eq!(response.into_value()["data"], json!({ "items": [1, null, 3] }));
    });
}

#[test]
fn bubbling_stops_at_the_nearest_nullable_ancestor() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("outer", "Outer").resolve_with(resolves_to(value!({})))],
        ));
        registry.insert_type(ObjectType::new(
            "Outer",
            [MetaField::new("inner", "Inner!").resolve_with(resolves_to(value!({})))],
        ));
        registry.insert_type(ObjectType::new(
            "Inner",
            [MetaField::new("x", "Int!").resolve_with(resolves_to(value!(null)))],
        ));
        let response = Schema::new(registry).execute("{ outer { inner { x } } }").await;

        // The error is recorded exactly once, at the field that raised it;
        // the nearest nullable ancestor absorbs the null.
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].path,
            vec![
                PathSegment::Field("outer".to_string()),
                PathSegment::Field("inner".to_string()),
                PathSegment::Field("x".to_string()),
            ]
        );
        assert_eq!(response.into_value()["data"], json!({ "outer": null }));
    });
}

#[test]
fn resolver_error_values_are_preserved_as_sources() {
    #[derive(Debug)]
    struct Boom;
    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("boom")
        }
    }

    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("a", "Int").resolve_with(|_: ResolverContext<'_>| {
                FieldFuture::error(deltaql::Error::new_with_source(Boom))
            })],
        ));
        let response = Schema::new(registry).execute("{ a }").await;

        assert_eq!(response.errors[0].message, "boom");
        assert!(response.errors[0]
            .source
            .as_ref()
            .unwrap()
            .downcast_ref::<Boom>()
            .is_some());
    });
}

#[test]
fn non_iterable_values_for_list_fields() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("items", "[Int]").resolve_with(resolves_to(value!(42)))],
        ));
        let response = Schema::new(registry).execute("{ items }").await;

        assert_eq!(
            response.errors[0].message,
            r#"Expected Iterable, but did not find one for field "Query.items"."#
        );
        assert_eq!(response.into_value()["data"], json!({ "items": null }));
    });
}

#[test]
fn enums_reject_values_outside_their_declared_set() {
    runtime().block_on(async {
        use deltaql::registry::{EnumType, MetaEnumValue};

        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [MetaField::new("state", "State").resolve_with(resolves_to(value!("BROKEN")))],
        ));
        registry.insert_type(EnumType::new(
            "State",
            [MetaEnumValue::new("OPEN"), MetaEnumValue::new("CLOSED")],
        ));
        let response = Schema::new(registry).execute("{ state }").await;

        assert_eq!(
            response.errors[0].message,
            r#"Enum "State" cannot represent value: "BROKEN""#
        );
        assert_eq!(response.into_value()["data"], json!({ "state": null }));
    });
}

#[test]
fn custom_scalar_serializers_run_on_completion() {
    runtime().block_on(async {
        use deltaql::registry::ScalarType;

        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [
                MetaField::new("shouted", "Shout").resolve_with(resolves_to(value!("hello"))),
                MetaField::new("swallowed", "Shout").resolve_with(resolves_to(value!(42))),
            ],
        ));
        registry.insert_type(ScalarType::new("Shout").with_serializer(|value| {
            Ok(match value {
                deltaql::Value::String(s) => deltaql::Value::String(s.to_uppercase()),
                _ => deltaql::Value::Null,
            })
        }));
        let response = Schema::new(registry).execute("{ shouted swallowed }").await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].message,
            "Expected `Shout.serialize(42)` to return a non-nullable value, returned: null"
        );
        assert_eq!(
            response.into_value()["data"],
            json!({ "shouted": "HELLO", "swallowed": null })
        );
    });
}
