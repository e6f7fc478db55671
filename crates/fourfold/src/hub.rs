//! Per-identity outbound queues.
//!
//! Every live connection owns one bounded queue. Any task may push a
//! frame into any identity's queue; only that connection's writer task
//! pulls from it. A full queue drops the new frame so that a slow or dead
//! peer can never stall the task that is processing a move.

use std::collections::HashMap;

use fourfold_protocol::Identity;
use fourfold_transport::ConnectionId;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};

struct Route {
    connection: ConnectionId,
    tx: mpsc::Sender<String>,
}

/// Routes encoded frames to the connection currently serving an identity.
pub(crate) struct ConnectionHub {
    routes: RwLock<HashMap<Identity, Route>>,
    capacity: usize,
}

impl ConnectionHub {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Installs a queue for `identity` served by `connection` and returns
    /// its receiving end.
    ///
    /// A newer connection replaces an older one for the same identity.
    /// The older queue's sender is dropped, which ends its writer task.
    pub(crate) async fn register(
        &self,
        identity: Identity,
        connection: ConnectionId,
    ) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let previous = self
            .routes
            .write()
            .await
            .insert(identity.clone(), Route { connection, tx });
        if let Some(previous) = previous {
            tracing::debug!(
                %identity,
                old = %previous.connection,
                new = %connection,
                "connection replaced"
            );
        }
        rx
    }

    /// Removes the route for `identity` if it still belongs to
    /// `connection`. Returns `false` when a newer connection has taken
    /// over, in which case the caller must not treat the identity as gone.
    pub(crate) async fn unregister(
        &self,
        identity: &Identity,
        connection: ConnectionId,
    ) -> bool {
        let mut routes = self.routes.write().await;
        let owned = routes
            .get(identity)
            .is_some_and(|route| route.connection == connection);
        if owned {
            routes.remove(identity);
        }
        owned
    }

    pub(crate) async fn is_online(&self, identity: &Identity) -> bool {
        self.routes.read().await.contains_key(identity)
    }

    /// Queues `frame` for `identity` without waiting. Returns `false` if
    /// the identity is offline or its queue is full or closed.
    pub(crate) async fn deliver(&self, identity: &Identity, frame: String) -> bool {
        let routes = self.routes.read().await;
        let Some(route) = routes.get(identity) else {
            return false;
        };
        match route.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(%identity, "outbound queue full, frame dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("alice")
    }

    #[tokio::test]
    async fn test_deliver_registered_identity_reaches_receiver() {
        let hub = ConnectionHub::new(8);
        let mut rx = hub.register(alice(), ConnectionId::new(1)).await;

        assert!(hub.deliver(&alice(), "hello".into()).await);

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_deliver_unknown_identity_returns_false() {
        let hub = ConnectionHub::new(8);
        assert!(!hub.deliver(&alice(), "hello".into()).await);
    }

    #[tokio::test]
    async fn test_deliver_full_queue_drops_newest() {
        let hub = ConnectionHub::new(2);
        let mut rx = hub.register(alice(), ConnectionId::new(1)).await;

        assert!(hub.deliver(&alice(), "1".into()).await);
        assert!(hub.deliver(&alice(), "2".into()).await);
        assert!(!hub.deliver(&alice(), "3".into()).await);

        assert_eq!(rx.recv().await.as_deref(), Some("1"));
        assert_eq!(rx.recv().await.as_deref(), Some("2"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_register_newer_connection_closes_older_queue() {
        let hub = ConnectionHub::new(8);
        let mut old = hub.register(alice(), ConnectionId::new(1)).await;
        let mut new = hub.register(alice(), ConnectionId::new(2)).await;

        assert!(hub.deliver(&alice(), "hi".into()).await);

        assert_eq!(old.recv().await, None);
        assert_eq!(new.recv().await.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_unregister_stale_connection_keeps_newer_route() {
        let hub = ConnectionHub::new(8);
        let _old = hub.register(alice(), ConnectionId::new(1)).await;
        let _new = hub.register(alice(), ConnectionId::new(2)).await;

        assert!(!hub.unregister(&alice(), ConnectionId::new(1)).await);
        assert!(hub.is_online(&alice()).await);

        assert!(hub.unregister(&alice(), ConnectionId::new(2)).await);
        assert!(!hub.is_online(&alice()).await);
    }
}
