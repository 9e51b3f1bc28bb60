mod streaming;

use std::collections::BTreeMap;

use async_graphql_value::ConstValue;
use serde::ser::SerializeMap;
use serde::Serialize;

use crate::{Result, ServerError};

pub use streaming::{CompletionPayload, IncrementalPayload, InitialResponse, StreamingPayload};

/// Query response.
///
/// `data` is present exactly when execution reached the resolvers, even if
/// non-null bubbling nulled it all the way to the root; request errors leave
/// it absent and the serialized response carries no `data` key at all.
#[derive(Debug, Default)]
pub struct Response {
    /// Data of query result.
    pub data: Option<ConstValue>,

    /// Extensions result.
    pub extensions: BTreeMap<String, ConstValue>,

    /// Errors.
    pub errors: Vec<ServerError>,
}

impl Response {
    /// Create a new successful response with the data.
    #[must_use]
    pub fn new(data: ConstValue) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    /// Create a response from some errors.
    #[must_use]
    pub fn from_errors(errors: Vec<ServerError>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }

    /// Set the extension result of the response.
    #[must_use]
    pub fn extension(mut self, name: impl Into<String>, value: ConstValue) -> Self {
        self.extensions.insert(name.into(), value);
        self
    }

    /// Returns `true` if the response is ok.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `true` if the response is an error.
    #[inline]
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    /// Extract the error from the response. Only if the `errors` field is
    /// empty will this return `Ok`.
    #[inline]
    pub fn into_result(self) -> Result<Self, Vec<ServerError>> {
        if self.is_err() {
            Err(self.errors)
        } else {
            Ok(self)
        }
    }

    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Wrap this response as the first payload of a streaming response.
    pub fn into_streaming_payload(self, has_next: bool) -> StreamingPayload {
        StreamingPayload::InitialResponse(InitialResponse {
            data: self.data,
            errors: self.errors,
            has_next,
        })
    }
}

impl Serialize for Response {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(data) = &self.data {
            map.serialize_entry("data", data)?;
        }
        if !self.errors.is_empty() {
            map.serialize_entry("errors", &self.errors)?;
        }
        if !self.extensions.is_empty() {
            map.serialize_entry("extensions", &self.extensions)?;
        }
        map.end()
    }
}
