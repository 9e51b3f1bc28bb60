use async_graphql_value::ConstValue;
use serde::Serialize;

use crate::{error::ServerError, PathSegment};

/// If a caller makes a streaming request, this is the set of different
/// response payloads they can receive. The first payload will always be an
/// `InitialResponse` - followed by zero or more `Incremental` payloads (if
/// there were any deferred workloads in the request) and a final
/// `Completion` payload when there were.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StreamingPayload {
    Incremental(IncrementalPayload),
    InitialResponse(InitialResponse),
    Completion(CompletionPayload),
}

/// The initial streaming response is _almost_ identical to a standard
/// response, but with the `hasNext` key in it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialResponse {
    /// The standard GraphQL response data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ConstValue>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ServerError>,

    /// Whether the client should expect more payloads or not.
    pub has_next: bool,
}

/// An incremental response payload as described in the [stream & defer
/// RFC][1].
///
/// This is very similar to the main response payload, but with additional
/// fields for `label`, `path` & `has_next`.
///
/// [1]: https://github.com/graphql/graphql-wg/blob/main/rfcs/DeferStream.md#payload-format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub data: ConstValue,
    pub path: Vec<PathSegment>,
    pub has_next: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ServerError>,
}

/// The standalone final payload of a streaming response, telling the client
/// no further payloads follow.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    pub has_next: bool,
}

impl CompletionPayload {
    pub fn new() -> Self {
        CompletionPayload { has_next: false }
    }
}

impl Default for CompletionPayload {
    fn default() -> Self {
        Self::new()
    }
}

impl From<IncrementalPayload> for StreamingPayload {
    fn from(val: IncrementalPayload) -> Self {
        StreamingPayload::Incremental(val)
    }
}

impl From<CompletionPayload> for StreamingPayload {
    fn from(val: CompletionPayload) -> Self {
        StreamingPayload::Completion(val)
    }
}
