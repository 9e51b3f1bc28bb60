//! Helpers for the deltaql integration tests: a blocking runtime, resolver
//! shorthands, and response assertions.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use deltaql::{
    Error, FieldFuture, ResolvedValue, ResolverContext, Response, StreamingPayload, Value,
};
use futures::{Stream, StreamExt};

/// A current-thread runtime for driving executions in tests.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("to be able to build a runtime")
}

pub trait ResponseExt: Sized {
    /// Asserts that there are no errors in this response.
    #[allow(clippy::return_self_not_must_use)]
    fn assert_success(self) -> Self;

    /// Converts the response into a `serde_json` value.
    #[must_use]
    fn into_value(self) -> serde_json::Value;
}

impl ResponseExt for Response {
    fn assert_success(self) -> Self {
        assert_eq!(self.errors, vec![]);
        self
    }

    fn into_value(self) -> serde_json::Value {
        self.to_json_value().expect("response to be serializable")
    }
}

impl ResponseExt for StreamingPayload {
    fn assert_success(self) -> Self {
        match &self {
            StreamingPayload::InitialResponse(initial) => assert_eq!(initial.errors, vec![]),
            StreamingPayload::Incremental(incremental) => assert_eq!(incremental.errors, vec![]),
            StreamingPayload::Completion(_) => {}
        }
        self
    }

    fn into_value(self) -> serde_json::Value {
        serde_json::to_value(self).expect("streaming payload to be serializable")
    }
}

/// Collect every payload of a streaming execution as JSON values.
pub async fn collect_stream(stream: impl Stream<Item = StreamingPayload>) -> Vec<serde_json::Value> {
    stream.map(ResponseExt::into_value).collect().await
}

/// A resolver producing a fixed value.
pub fn resolves_to(
    value: Value,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |_: ResolverContext<'_>| FieldFuture::from_value(value.clone())
}

/// A resolver producing a fixed value from a future that suspends once
/// before settling.
pub fn resolves_async(
    value: Value,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |_: ResolverContext<'_>| {
        let value = value.clone();
        FieldFuture::new(async move {
            yield_once().await;
            Ok(ResolvedValue::Value(value))
        })
    }
}

/// A resolver that fails with the given message.
pub fn fails_with(
    message: &'static str,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |_: ResolverContext<'_>| FieldFuture::error(Error::new(message))
}

/// Suspend exactly once.
pub fn yield_once() -> YieldOnce {
    YieldOnce(false)
}

pub struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
