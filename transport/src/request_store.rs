//! The pending-request table: ids awaiting a correlated reply.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::client::TransportError;

pub(crate) type ReplySender = oneshot::Sender<Result<Value, TransportError>>;

/// Owned exclusively by the bridge actor. Each id gets exactly one
/// terminal resolution: the entry is removed atomically with
/// fulfilment, failure or abandonment.
#[derive(Default)]
pub(crate) struct PendingRequests {
    inner: HashMap<String, ReplySender>,
}

impl PendingRequests {
    pub(crate) fn register(&mut self, id: &str, respond_to: ReplySender) {
        if self.inner.insert(id.to_owned(), respond_to).is_some() {
            // ids are uuid v4, so a duplicate means a caller bug
            tracing::error!(%id, "replaced pending request with duplicate id");
        }
    }

    /// Resolves the pending entry for `id`, returning false if there is
    /// none (a late reply after abandonment).
    pub(crate) fn resolve(&mut self, id: &str, result: Result<Value, TransportError>) -> bool {
        match self.inner.remove(id) {
            Some(respond_to) => {
                let _ = respond_to.send(result);
                true
            }
            None => false,
        }
    }

    /// Fails every pending request. Used when the connection is lost or
    /// an explicit disconnect is requested; in-flight requests cannot
    /// be replayed against a new connection.
    pub(crate) fn abandon_all(&mut self, reason: &str) {
        for (id, respond_to) in self.inner.drain() {
            tracing::debug!(%id, %reason, "abandoning pending request");
            let _ = respond_to.send(Err(TransportError::ConnectionLost(reason.to_owned())));
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}
