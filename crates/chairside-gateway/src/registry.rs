use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use chairside_types::events::ServerEvent;

/// Default sweep cadence: every 5 minutes, evict connections idle > 30.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Message delivered to a connection's send task.
#[derive(Debug)]
pub enum Outbound {
    Event(ServerEvent),
    /// Forcible disconnect, issued by the idle sweep.
    Close,
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

struct Session {
    room: Option<String>,
    last_activity: Instant,
    tx: OutboundSender,
}

/// Bookkeeping for connected clients and their date-room membership.
/// Constructed once at startup and passed by reference — never a hidden
/// singleton. It never touches reservation data.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

struct RegistryInner {
    sessions: HashMap<Uuid, Session>,
    rooms: HashMap<String, HashSet<Uuid>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                sessions: HashMap::new(),
                rooms: HashMap::new(),
            })),
        }
    }

    /// Track a new connection; the sender feeds its send task.
    pub async fn register(&self, tx: OutboundSender) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner.write().await.sessions.insert(
            conn_id,
            Session {
                room: None,
                last_activity: Instant::now(),
                tx,
            },
        );
        conn_id
    }

    /// Enter the date room for `date`. A connection is in at most one room
    /// at a time, so any previous membership is dropped first.
    pub async fn join(&self, conn_id: Uuid, date: &str) {
        let mut inner = self.inner.write().await;
        inner.remove_from_room(conn_id);

        inner.rooms.entry(date.to_string()).or_default().insert(conn_id);
        if let Some(session) = inner.sessions.get_mut(&conn_id) {
            session.room = Some(date.to_string());
            session.last_activity = Instant::now();
        }
        debug!("Connection {} joined room {}", conn_id, date);
    }

    /// Leave `date`'s room. A no-op if not a member.
    pub async fn leave(&self, conn_id: Uuid, date: &str) {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.rooms.get_mut(date) {
            members.remove(&conn_id);
            if members.is_empty() {
                inner.rooms.remove(date);
            }
        }
        if let Some(session) = inner.sessions.get_mut(&conn_id) {
            if session.room.as_deref() == Some(date) {
                session.room = None;
            }
            session.last_activity = Instant::now();
        }
    }

    /// Refresh liveness; called on every inbound command.
    pub async fn touch(&self, conn_id: Uuid) {
        if let Some(session) = self.inner.write().await.sessions.get_mut(&conn_id) {
            session.last_activity = Instant::now();
        }
    }

    pub async fn on_disconnect(&self, conn_id: Uuid) {
        let mut inner = self.inner.write().await;
        inner.remove_from_room(conn_id);
        inner.sessions.remove(&conn_id);
    }

    /// Outbound senders for every member of `date`'s room.
    pub async fn room_senders(&self, date: &str) -> Vec<OutboundSender> {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(date) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|id| inner.sessions.get(id))
            .map(|s| s.tx.clone())
            .collect()
    }

    /// The sender for a single connection, used for caller-only replies.
    pub async fn sender(&self, conn_id: Uuid) -> Option<OutboundSender> {
        self.inner
            .read()
            .await
            .sessions
            .get(&conn_id)
            .map(|s| s.tx.clone())
    }

    /// Forcibly disconnect every connection idle longer than `timeout`.
    /// Returns the number evicted.
    pub async fn sweep_idle(&self, timeout: Duration) -> usize {
        let mut inner = self.inner.write().await;

        let idle: Vec<Uuid> = inner
            .sessions
            .iter()
            .filter(|(_, s)| s.last_activity.elapsed() > timeout)
            .map(|(id, _)| *id)
            .collect();

        for conn_id in &idle {
            if let Some(session) = inner.sessions.get(conn_id) {
                let _ = session.tx.send(Outbound::Close);
            }
            inner.remove_from_room(*conn_id);
            inner.sessions.remove(conn_id);
            info!("Evicted idle connection {}", conn_id);
        }

        idle.len()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryInner {
    fn remove_from_room(&mut self, conn_id: Uuid) {
        let Some(room) = self
            .sessions
            .get_mut(&conn_id)
            .and_then(|s| s.room.take())
        else {
            return;
        };
        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&conn_id);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }
    }
}

/// Background timer task that prunes idle connections. Independent of
/// command processing; nothing thrown in here may kill the loop.
pub async fn run_idle_sweep(registry: Registry, interval: Duration, timeout: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let evicted = registry.sweep_idle(timeout).await;
        if evicted > 0 {
            info!("Idle sweep disconnected {} connections", evicted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_conn() -> (OutboundSender, mpsc::UnboundedReceiver<Outbound>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn joining_second_room_leaves_first() {
        let registry = Registry::new();
        let (tx, _rx) = fake_conn();
        let conn = registry.register(tx).await;

        registry.join(conn, "2025-07-16").await;
        assert_eq!(registry.room_senders("2025-07-16").await.len(), 1);

        registry.join(conn, "2025-07-17").await;
        assert!(registry.room_senders("2025-07-16").await.is_empty());
        assert_eq!(registry.room_senders("2025-07-17").await.len(), 1);
    }

    #[tokio::test]
    async fn leave_is_noop_for_non_members() {
        let registry = Registry::new();
        let (tx, _rx) = fake_conn();
        let conn = registry.register(tx).await;

        registry.leave(conn, "2025-07-16").await;
        registry.join(conn, "2025-07-16").await;
        registry.leave(conn, "2025-07-17").await; // wrong room, still a member
        assert_eq!(registry.room_senders("2025-07-16").await.len(), 1);

        registry.leave(conn, "2025-07-16").await;
        assert!(registry.room_senders("2025-07-16").await.is_empty());
    }

    #[tokio::test]
    async fn disconnect_clears_membership_and_session() {
        let registry = Registry::new();
        let (tx, _rx) = fake_conn();
        let conn = registry.register(tx).await;
        registry.join(conn, "2025-07-16").await;

        registry.on_disconnect(conn).await;
        assert_eq!(registry.session_count().await, 0);
        assert!(registry.room_senders("2025-07-16").await.is_empty());
        assert!(registry.sender(conn).await.is_none());
    }

    #[tokio::test]
    async fn sweep_evicts_only_idle_connections() {
        let registry = Registry::new();
        let (tx, mut rx) = fake_conn();
        let conn = registry.register(tx).await;
        registry.join(conn, "2025-07-16").await;

        // Generous timeout: nobody is idle yet.
        assert_eq!(registry.sweep_idle(Duration::from_secs(60)).await, 0);
        assert_eq!(registry.session_count().await, 1);

        // Zero timeout: everyone is idle.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(registry.sweep_idle(Duration::ZERO).await, 1);
        assert_eq!(registry.session_count().await, 0);
        assert!(matches!(rx.recv().await, Some(Outbound::Close)));
    }
}
