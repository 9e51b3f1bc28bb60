//! Incremental delivery of `@defer`red fragments.

use deltaql::{
    registry::{MetaField, ObjectType, Registry},
    value, Schema,
};
use futures::StreamExt;
use integration_tests::{collect_stream, fails_with, resolves_async, resolves_to, runtime, ResponseExt};
use serde_json::json;

fn simple_schema() -> Schema {
    let mut registry = Registry::new();
    registry.insert_type(ObjectType::new(
        "Query",
        [
            MetaField::new("a", "Int").resolve_with(resolves_to(value!(1))),
            MetaField::new("b", "Int").resolve_with(resolves_async(value!(2))),
        ],
    ));
    Schema::new(registry)
}

#[test]
fn deferred_fragments_arrive_after_the_initial_response() {
    runtime().block_on(async {
        let payloads = collect_stream(simple_schema().execute_stream("{ a ... @defer { b } }")).await;
        insta::assert_json_snapshot!(payloads, @r###"
        [
          {
            "data": {
              "a": 1
            },
            "hasNext": true
          },
          {
            "data": {
              "b": 2
            },
            "hasNext": true,
            "path": []
          },
          {
            "hasNext": false
          }
        ]
        "###);
    });
}

#[test]
fn defer_labels_are_echoed_on_the_patch() {
    runtime().block_on(async {
        let payloads =
            collect_stream(simple_schema().execute_stream(r#"{ a ... @defer(label: "later") { b } }"#)).await;
        assert_eq!(
            payloads[1],
            json!({ "data": { "b": 2 }, "hasNext": true, "label": "later", "path": [] })
        );
    });
}

#[test]
fn defer_disabled_with_if_false_resolves_in_place() {
    runtime().block_on(async {
        let payloads =
            collect_stream(simple_schema().execute_stream("{ a ... @defer(if: false) { b } }")).await;
        assert_eq!(payloads, vec![json!({ "data": { "a": 1, "b": 2 }, "hasNext": false })]);
    });
}

#[test]
fn the_blocking_surface_resolves_deferred_fragments_in_place() {
    runtime().block_on(async {
        let response = simple_schema()
            .execute("{ a ... @defer { b } }")
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "a": 1, "b": 2 } }));
    });
}

#[test]
fn deferred_fragment_spreads() {
    runtime().block_on(async {
        let payloads = collect_stream(simple_schema().execute_stream(
            r#"
            query {
                a
                ...Extra @defer
            }
            fragment Extra on Query {
                b
            }
            "#,
        ))
        .await;
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[1], json!({ "data": { "b": 2 }, "hasNext": true, "path": [] }));
    });
}

#[test]
fn nested_defers_deliver_parents_before_children() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [
                MetaField::new("a", "Int").resolve_with(resolves_to(value!(1))),
                MetaField::new("user", "User").resolve_with(resolves_async(value!({
                    "name": "Ada",
                    "bio": "wrote programs",
                }))),
            ],
        ));
        registry.insert_type(ObjectType::new(
            "User",
            [MetaField::new("name", "String"), MetaField::new("bio", "String")],
        ));

        let payloads = collect_stream(Schema::new(registry).execute_stream(
            "{ a ... @defer { user { name ... @defer { bio } } } }",
        ))
        .await;

        assert_eq!(
            payloads,
            vec![
                json!({ "data": { "a": 1 }, "hasNext": true }),
                json!({ "data": { "user": { "name": "Ada" } }, "hasNext": true, "path": [] }),
                json!({ "data": { "bio": "wrote programs" }, "hasNext": true, "path": ["user"] }),
                json!({ "hasNext": false }),
            ]
        );
    });
}

#[test]
fn errors_inside_a_deferred_fragment_attach_to_its_payload() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [
                MetaField::new("a", "Int").resolve_with(resolves_to(value!(1))),
                MetaField::new("broken", "Int").resolve_with(fails_with("boom")),
            ],
        ));

        let mut stream = Box::pin(Schema::new(registry).execute_stream("{ a ... @defer { broken } }"));

        let initial = stream.next().await.unwrap().assert_success().into_value();
        assert_eq!(initial, json!({ "data": { "a": 1 }, "hasNext": true }));

        let patch = stream.next().await.unwrap().into_value();
        assert_eq!(
            patch["errors"][0]["message"],
            json!("boom"),
        );
        assert_eq!(patch["errors"][0]["path"], json!(["broken"]));
        assert_eq!(patch["data"], json!({ "broken": null }));
    });
}

#[test]
fn request_errors_terminate_a_stream_immediately() {
    runtime().block_on(async {
        let payloads = collect_stream(simple_schema().execute_stream("{ a")).await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["hasNext"], json!(false));
        assert!(payloads[0].get("data").is_none());
    });
}
