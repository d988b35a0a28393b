use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::warn;
use uuid::Uuid;

use hearth_db::Database;
use hearth_types::events::GatewayEvent;

/// Manages all connected clients: the online-presence registry, per-user
/// targeted channels, and the broadcast stream for global events.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    db: Arc<Database>,

    /// Broadcast channel for global gateway events (presence)
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Online users: user_id -> when they were last seen connecting
    online_users: RwLock<HashMap<Uuid, DateTime<Utc>>>,

    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new(db: Arc<Database>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                db,
                broadcast_tx,
                online_users: RwLock::new(HashMap::new()),
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to global gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver).
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister a per-user targeted channel, but only if conn_id matches.
    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(&user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(&user_id);
            }
        }
    }

    /// Send a targeted event to a specific user. Users without a live
    /// connection simply miss the event; they catch up over REST.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some((_, tx)) = channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }

    /// Mark a user online: registry insert, presence broadcast, and a
    /// best-effort persisted write.
    pub async fn user_online(&self, user_id: Uuid) {
        let now = Utc::now();
        self.inner.online_users.write().await.insert(user_id, now);

        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            online: true,
            last_seen: now,
        });

        self.persist_presence(user_id, true, now).await;
    }

    /// Mark a user offline. Only cleans up if conn_id still owns the user
    /// channel — a stale disconnect racing a reconnect must not flip the
    /// newer connection's presence.
    pub async fn user_offline(&self, user_id: Uuid, conn_id: Uuid) {
        let is_current = {
            let channels = self.inner.user_channels.read().await;
            channels
                .get(&user_id)
                .is_some_and(|(cid, _)| *cid == conn_id)
        };

        if !is_current {
            // A newer connection has taken over
            return;
        }

        let now = Utc::now();
        self.inner.online_users.write().await.remove(&user_id);
        self.unregister_user_channel(user_id, conn_id).await;

        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            online: false,
            last_seen: now,
        });

        self.persist_presence(user_id, false, now).await;
    }

    /// Snapshot of who is online right now, with last-seen timestamps.
    pub async fn online_users(&self) -> Vec<(Uuid, DateTime<Utc>)> {
        self.inner
            .online_users
            .read()
            .await
            .iter()
            .map(|(id, at)| (*id, *at))
            .collect()
    }

    /// Presence is advisory: persistence failures are logged, never
    /// surfaced to the connection.
    async fn persist_presence(&self, user_id: Uuid, online: bool, at: DateTime<Utc>) {
        let db = self.inner.db.clone();
        let ts = at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        let result = tokio::task::spawn_blocking(move || {
            db.set_presence(&user_id.to_string(), online, &ts)
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("presence write failed for {}: {}", user_id, e),
            Err(e) => warn!("presence write task failed for {}: {}", user_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> Dispatcher {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.create_user("11111111-1111-1111-1111-111111111111", "a@example.org", "hash", "a", "donor", None)
            .unwrap();
        Dispatcher::new(db)
    }

    fn uid() -> Uuid {
        "11111111-1111-1111-1111-111111111111".parse().unwrap()
    }

    #[tokio::test]
    async fn subscriber_sees_online_before_any_further_change() {
        let d = dispatcher();
        let mut rx = d.subscribe();

        d.user_online(uid()).await;

        match rx.recv().await.unwrap() {
            GatewayEvent::PresenceUpdate {
                user_id, online, ..
            } => {
                assert_eq!(user_id, uid());
                assert!(online);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn online_set_reflects_connect_and_disconnect() {
        let d = dispatcher();
        let (conn_id, _rx) = d.register_user_channel(uid()).await;
        d.user_online(uid()).await;
        assert!(d.online_users().await.iter().any(|(id, _)| *id == uid()));

        d.user_offline(uid(), conn_id).await;
        assert!(d.online_users().await.is_empty());
    }

    #[tokio::test]
    async fn stale_disconnect_does_not_evict_newer_connection() {
        let d = dispatcher();
        let (old_conn, _old_rx) = d.register_user_channel(uid()).await;
        d.user_online(uid()).await;

        // Reconnect replaces the channel
        let (_new_conn, mut new_rx) = d.register_user_channel(uid()).await;
        d.user_online(uid()).await;

        // The stale connection's teardown fires late
        d.user_offline(uid(), old_conn).await;

        assert!(d.online_users().await.iter().any(|(id, _)| *id == uid()));

        // The newer channel still receives targeted events
        d.send_to_user(
            uid(),
            GatewayEvent::Ready {
                user_id: uid(),
                display_name: "a".into(),
            },
        )
        .await;
        assert!(matches!(
            new_rx.recv().await,
            Some(GatewayEvent::Ready { .. })
        ));
    }

    #[tokio::test]
    async fn presence_round_trips_to_storage() {
        let d = dispatcher();
        d.user_online(uid()).await;

        let db = d.inner.db.clone();
        let user = db
            .get_user_by_id("11111111-1111-1111-1111-111111111111")
            .unwrap()
            .unwrap();
        assert!(user.online);
        assert!(user.last_seen.is_some());
    }
}
