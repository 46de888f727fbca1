//! Request/response correlation for transports with a shared inbound channel.

use crate::error::{McpError, McpResult};
use crate::protocol::JsonRpcResponse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::warn;

type Slot = oneshot::Sender<McpResult<JsonRpcResponse>>;

#[derive(Default)]
struct Table {
    waiting: HashMap<u64, Slot>,
    /// Set once the inbound channel is gone.
    closed: Option<String>,
}

/// Outstanding requests keyed by JSON-RPC id.
#[derive(Default)]
pub struct PendingRequests {
    table: Mutex<Table>,
}

impl PendingRequests {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register interest in the response with `id`.
    ///
    /// Fails once the inbound channel has been closed.
    pub fn register(self: &Arc<Self>, id: u64) -> McpResult<Waiter> {
        let (tx, rx) = oneshot::channel();
        let mut table = self.lock();
        if let Some(reason) = &table.closed {
            return Err(McpError::connection_failed(reason.clone()));
        }
        table.waiting.insert(id, tx);

        Ok(Waiter {
            id,
            rx,
            pending: Arc::clone(self),
        })
    }

    /// Deliver a response to its waiter.
    ///
    /// Returns `false` when nobody is waiting for the id.
    pub fn resolve(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.id else {
            warn!("Discarding response without id");
            return false;
        };

        let slot = self.lock().waiting.remove(&id);
        match slot {
            Some(tx) => tx.send(Ok(response)).is_ok(),
            None => {
                warn!(id, "Discarding response for unknown or expired request");
                false
            }
        }
    }

    /// Fail every outstanding waiter and refuse new ones.
    pub fn close(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let drained: Vec<Slot> = {
            let mut table = self.lock();
            table.closed.get_or_insert_with(|| reason.clone());
            table.waiting.drain().map(|(_, tx)| tx).collect()
        };

        for tx in drained {
            let _ = tx.send(Err(McpError::connection_failed(reason.clone())));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    /// Number of requests still waiting.
    pub fn len(&self) -> usize {
        self.lock().waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget(&self, id: u64) {
        self.lock().waiting.remove(&id);
    }
}

/// Single-use handle for one pending response.
///
/// Dropping it unregisters the id, so cancelled or timed-out requests never
/// leave entries behind.
pub struct Waiter {
    id: u64,
    rx: oneshot::Receiver<McpResult<JsonRpcResponse>>,
    pending: Arc<PendingRequests>,
}

impl Waiter {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the response.
    pub async fn wait(mut self) -> McpResult<JsonRpcResponse> {
        match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => Err(McpError::connection_failed("Transport closed")),
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.pending.forget(self.id);
    }
}
