//! Scripted transport for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use super::{Transport, TransportError, TransportFuture};
use crate::http::{Request, Response, StatusCode};

type Handler = dyn Fn(&Request, usize) -> Result<Response, TransportError> + Send + Sync;

/// A transport whose answers come from a closure.
///
/// The closure receives the request and the 1-based index of this physical
/// call. Every call is recorded, and `latency` is slept before answering so
/// tests can observe concurrency under a paused clock.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    latency: Duration,
    calls: AtomicUsize,
    completed: AtomicUsize,
    log: Mutex<Vec<(Instant, Request)>>,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&Request, usize) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call with `200 OK` and a JSON body.
    pub(crate) fn json(body: &'static str) -> Self {
        Self::new(move |_, _| Ok(json_response(StatusCode::OK, body)))
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of calls started.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls that ran to completion (not dropped mid-flight).
    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Start instants of every call, in order.
    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.log.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    /// Requests seen, in order.
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request) -> TransportFuture<'_> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.log.lock().unwrap().push((Instant::now(), request.clone()));
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let result = (self.handler)(&request, n);
            self.completed.fetch_add(1, Ordering::SeqCst);
            result
        })
    }
}

pub(crate) fn json_response(status: StatusCode, body: &'static str) -> Response {
    Response::new(status)
        .header("Content-Type", "application/json")
        .body(body)
}
