//! General execution tests: field resolution, response ordering, fragments,
//! arguments and operation selection.

use deltaql::{
    registry::{MetaField, MetaInputValue, ObjectType, Registry},
    value, FieldFuture, Request, ResolverContext, Schema, Variables,
};
use integration_tests::{resolves_async, resolves_to, runtime, ResponseExt};
use serde_json::json;

fn simple_schema() -> Schema {
    let mut registry = Registry::new();
    registry.insert_type(ObjectType::new(
        "Query",
        [
            MetaField::new("a", "Int").resolve_with(resolves_to(value!(1))),
            MetaField::new("b", "Int").resolve_with(resolves_to(value!(2))),
        ],
    ));
    Schema::new(registry)
}

#[test]
fn plain_fields() {
    runtime().block_on(async {
        let response = simple_schema().execute("{ a b }").await.assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "a": 1, "b": 2 } }));
    });
}

#[test]
fn response_names_keep_first_appearance_order() {
    runtime().block_on(async {
        let response = simple_schema().execute("{ b a second: b }").await.assert_success();
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"data":{"b":2,"a":1,"second":2}}"#
        );
    });
}

#[test]
fn aliases() {
    runtime().block_on(async {
        let response = simple_schema().execute("{ first: a second: a }").await.assert_success();
        assert_eq!(
            response.into_value(),
            json!({ "data": { "first": 1, "second": 1 } })
        );
    });
}

#[test]
fn execute_sync_on_a_synchronous_schema() {
    let response = simple_schema().execute_sync("{ a b }").assert_success();
    assert_eq!(response.into_value(), json!({ "data": { "a": 1, "b": 2 } }));
}

#[test]
#[should_panic(expected = "suspended on an asynchronous resolver")]
fn execute_sync_panics_when_a_resolver_suspends() {
    let mut registry = Registry::new();
    registry.insert_type(ObjectType::new(
        "Query",
        [MetaField::new("a", "Int").resolve_with(resolves_async(value!(1)))],
    ));
    Schema::new(registry).execute_sync("{ a }");
}

#[test]
fn asynchronous_resolvers_interleave() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new(
            "Query",
            [
                MetaField::new("a", "Int").resolve_with(resolves_async(value!(1))),
                MetaField::new("b", "Int").resolve_with(resolves_to(value!(2))),
            ],
        ));
        let response = Schema::new(registry).execute("{ a b }").await.assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "a": 1, "b": 2 } }));
    });
}

fn nested_schema() -> Schema {
    let mut registry = Registry::new();
    registry.insert_type(ObjectType::new(
        "Query",
        [MetaField::new("film", "Film").resolve_with(resolves_to(value!({
            "id": "1000",
            "title": "Alien",
            "year": 1979,
        })))],
    ));
    registry.insert_type(ObjectType::new(
        "Film",
        [
            MetaField::new("id", "ID!"),
            MetaField::new("title", "String!"),
            MetaField::new("year", "Int"),
            MetaField::new("released", "Int").with_mapped_name("year"),
        ],
    ));
    Schema::new(registry)
}

#[test]
fn default_resolver_reads_properties() {
    runtime().block_on(async {
        let response = nested_schema()
            .execute("{ film { id title year } }")
            .await
            .assert_success();
        insta::assert_json_snapshot!(response.into_value(), @r###"
        {
          "data": {
            "film": {
              "id": "1000",
              "title": "Alien",
              "year": 1979
            }
          }
        }
        "###);
    });
}

#[test]
fn mapped_names_change_the_property_lookup() {
    runtime().block_on(async {
        let response = nested_schema().execute("{ film { released } }").await.assert_success();
        assert_eq!(
            response.into_value(),
            json!({ "data": { "film": { "released": 1979 } } })
        );
    });
}

#[test]
fn merged_selections_of_one_response_name() {
    runtime().block_on(async {
        let response = nested_schema()
            .execute("{ film { id } film { title } }")
            .await
            .assert_success();
        assert_eq!(
            response.into_value(),
            json!({ "data": { "film": { "id": "1000", "title": "Alien" } } })
        );
    });
}

#[test]
fn fragment_spreads_flatten_in_document_order() {
    runtime().block_on(async {
        let response = nested_schema()
            .execute(
                r#"
                query {
                    film {
                        ...Title
                        year
                    }
                }
                fragment Title on Film {
                    title
                }
                "#,
            )
            .await
            .assert_success();
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"data":{"film":{"title":"Alien","year":1979}}}"#
        );
    });
}

#[test]
fn unknown_fragments_are_an_error() {
    runtime().block_on(async {
        let response = nested_schema().execute("{ film { ...Missing } }").await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, r#"Unknown fragment "Missing"."#);
    });
}

#[test]
fn skip_and_include() {
    runtime().block_on(async {
        let response = simple_schema()
            .execute(
                Request::new(
                    r#"
                    query($on: Boolean!, $off: Boolean!) {
                        a @skip(if: $on)
                        b @include(if: $off)
                        kept: a @skip(if: $off)
                    }
                    "#,
                )
                .variables(Variables::from_json(json!({ "on": true, "off": false }))),
            )
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "kept": 1 } }));
    });
}

fn echo_schema() -> Schema {
    let mut registry = Registry::new();
    registry.insert_type(ObjectType::new(
        "Query",
        [MetaField::new("echo", "Int")
            .argument(MetaInputValue::new("n", "Int"))
            .resolve_with(|ctx: ResolverContext<'_>| FieldFuture::from_value(ctx.arg("n").clone()))],
    ));
    Schema::new(registry)
}

#[test]
fn arguments_from_literals_and_variables() {
    runtime().block_on(async {
        let schema = echo_schema();

        let response = schema.execute("{ echo(n: 42) }").await.assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "echo": 42 } }));

        let response = schema
            .execute(
                Request::new("query($n: Int) { echo(n: $n) }")
                    .variables(Variables::from_json(json!({ "n": 7 }))),
            )
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "echo": 7 } }));
    });
}

#[test]
fn variable_defaults_apply_when_not_provided() {
    runtime().block_on(async {
        let response = echo_schema()
            .execute("query($n: Int = 5) { echo(n: $n) }")
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "echo": 5 } }));
    });
}

#[test]
fn missing_required_variables_are_request_errors() {
    runtime().block_on(async {
        let response = echo_schema().execute("query($n: Int!) { echo(n: $n) }").await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].message,
            r#"Variable "$n" of required type "Int!" was not provided."#
        );
        assert!(!response.errors[0].locations.is_empty());
        assert_eq!(response.into_value().get("data"), None);
    });
}

#[test]
fn invalid_variable_values_are_request_errors() {
    runtime().block_on(async {
        let response = echo_schema()
            .execute(
                Request::new("query($n: Int!) { echo(n: $n) }")
                    .variables(Variables::from_json(json!({ "n": "nope" }))),
            )
            .await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].message,
            r#"Variable "$n" got invalid value; Invalid Int value for n"#
        );
        // Request errors carry no data key at all.
        assert_eq!(response.into_value().get("data"), None);
    });
}

#[test]
fn operation_selection() {
    runtime().block_on(async {
        let schema = simple_schema();

        let response = schema
            .execute(Request::new("query First { a } query Second { b }").with_operation_name("Second"))
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "b": 2 } }));

        let response = schema.execute("query First { a } query Second { b }").await;
        assert_eq!(
            response.errors[0].message,
            "Must provide operation name if query contains multiple operations."
        );

        let response = schema
            .execute(Request::new("{ a }").with_operation_name("Missing"))
            .await;
        assert_eq!(response.errors[0].message, r#"Unknown operation named "Missing"."#);
    });
}

#[test]
fn parse_errors_are_request_errors() {
    runtime().block_on(async {
        let response = simple_schema().execute("{ a").await;
        assert!(!response.errors.is_empty());
        assert_eq!(response.into_value().get("data"), None);
    });
}

#[test]
fn root_value_feeds_the_default_resolver() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new("Query", [MetaField::new("greeting", "String")]));
        let response = Schema::new(registry)
            .execute(Request::new("{ greeting }").root_value(value!({ "greeting": "hello" })))
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "greeting": "hello" } }));
    });
}

#[test]
fn field_resolver_override_applies_to_unresolved_fields() {
    runtime().block_on(async {
        let mut registry = Registry::new();
        registry.insert_type(ObjectType::new("Query", [MetaField::new("a", "Int")]));
        let response = Schema::new(registry)
            .execute(Request::new("{ a }").with_field_resolver(resolves_to(value!(99))))
            .await
            .assert_success();
        assert_eq!(response.into_value(), json!({ "data": { "a": 99 } }));
    });
}

#[test]
fn unknown_fields_error() {
    runtime().block_on(async {
        let response = simple_schema().execute("{ nope }").await;
        assert_eq!(
            response.errors[0].message,
            r#"Cannot query field "nope" on type "Query"."#
        );
    });
}
