//! Registry of calls whose network exchange has started but not resolved.

use std::collections::HashMap;

use futures::future::{BoxFuture, Shared, WeakShared};

use crate::cache::{CacheKey, Invalidation};
use crate::error::GatewayError;
use crate::http::Response;

/// One physical call, awaited by every caller attached to it.
pub(crate) type SharedCall = Shared<BoxFuture<'static, Result<Response, GatewayError>>>;

struct Flight {
    id: u64,
    call: WeakShared<BoxFuture<'static, Result<Response, GatewayError>>>,
}

/// Maps each key to its single in-flight call.
///
/// Only weak handles are stored: waiters own the call, so when the last one
/// detaches the call is dropped (and its exchange aborted) even though the
/// registry still names it. Each flight carries an id so a finishing call
/// never removes a newer flight registered under the same key.
#[derive(Default)]
pub(crate) struct InFlight {
    flights: HashMap<CacheKey, Flight>,
    next_id: u64,
}

impl InFlight {
    /// Returns a handle to the live call for `key`, pruning a dead entry.
    pub(crate) fn join(&mut self, key: &CacheKey) -> Option<SharedCall> {
        let call = self.flights.get(key)?.call.upgrade();
        if call.is_none() {
            self.flights.remove(key);
        }
        call
    }

    /// Reserves the id for the next flight.
    pub(crate) fn next_id(&mut self) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    /// Registers `call` as the flight for `key`.
    pub(crate) fn register(&mut self, key: CacheKey, id: u64, call: &SharedCall) {
        if let Some(call) = call.downgrade() {
            self.flights.insert(key, Flight { id, call });
        }
    }

    /// Removes the flight for `key` if it is still flight `id`.
    ///
    /// Returns `false` when the flight was detached or replaced in the
    /// meantime; its result must then not be cached.
    pub(crate) fn finish(&mut self, key: &CacheKey, id: u64) -> bool {
        let current = self.flights.get(key).is_some_and(|f| f.id == id);
        if current {
            self.flights.remove(key);
        }
        current
    }

    /// Forgets every flight `hint` selects. A detached call still resolves
    /// for the waiters it already has, but new callers start a fresh one.
    pub(crate) fn detach(&mut self, hint: &Invalidation) -> usize {
        let before = self.flights.len();
        self.flights.retain(|key, _| !hint.matches(key));
        before - self.flights.len()
    }

    /// Forgets every flight.
    pub(crate) fn detach_all(&mut self) -> usize {
        let n = self.flights.len();
        self.flights.clear();
        n
    }

    pub(crate) fn len(&self) -> usize {
        self.flights.len()
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;
    use crate::http::{Method, StatusCode};

    fn key(path: &str) -> CacheKey {
        CacheKey::derive(&Method::Get, path, &[], None)
    }

    fn ready_call() -> SharedCall {
        async { Ok(Response::new(StatusCode::OK)) }.boxed().shared()
    }

    #[test]
    fn join_returns_live_call() {
        let mut registry = InFlight::default();
        let call = ready_call();
        let id = registry.next_id();
        registry.register(key("/a"), id, &call);

        assert!(registry.join(&key("/a")).is_some());
        assert!(registry.join(&key("/b")).is_none());
        drop(call);
    }

    #[test]
    fn dead_flights_are_pruned_on_join() {
        let mut registry = InFlight::default();
        let call = ready_call();
        let id = registry.next_id();
        registry.register(key("/a"), id, &call);
        drop(call);

        assert!(registry.join(&key("/a")).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn finish_ignores_stale_ids() {
        let mut registry = InFlight::default();
        let first = ready_call();
        let old = registry.next_id();
        registry.register(key("/a"), old, &first);

        let second = ready_call();
        let new = registry.next_id();
        registry.register(key("/a"), new, &second);

        assert!(!registry.finish(&key("/a"), old));
        assert_eq!(registry.len(), 1);
        assert!(registry.finish(&key("/a"), new));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn detached_flights_no_longer_finish_as_current() {
        let mut registry = InFlight::default();
        let todos = ready_call();
        let users = ready_call();
        let todos_id = registry.next_id();
        registry.register(key("/todos/1"), todos_id, &todos);
        let users_id = registry.next_id();
        registry.register(key("/users"), users_id, &users);

        assert_eq!(registry.detach(&Invalidation::path("/todos")), 1);
        assert!(registry.join(&key("/todos/1")).is_none());
        assert!(!registry.finish(&key("/todos/1"), todos_id));

        assert_eq!(registry.detach_all(), 1);
        assert!(!registry.finish(&key("/users"), users_id));
    }
}
