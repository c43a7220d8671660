use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tokio::sync::mpsc;
use uuid::Uuid;

use switchboard_types::events::ServerEvent;
use switchboard_types::models::{Role, RoomId, RoomMember, Session};

/// In-memory index of everything that is currently connected: the global
/// session set, per-room membership, and the user-id -> connections map.
///
/// One mutex guards the whole index. Every operation below is a single
/// synchronous critical section with no await point inside, so concurrent
/// connects and disconnects can never observe a half-applied update — in
/// particular, `unregister` removes a connection from the global set and from
/// every room it occupied under the same lock acquisition.
pub struct PresenceRegistry {
    inner: Mutex<Inner>,
}

struct Entry {
    session: Session,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<Uuid, Entry>,
    rooms: HashMap<RoomId, HashSet<Uuid>>,
    by_user: HashMap<Uuid, HashSet<Uuid>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("presence lock poisoned")
    }

    pub fn register(&self, session: Session, tx: mpsc::UnboundedSender<ServerEvent>) {
        let mut inner = self.lock();
        let connection_id = session.connection_id;
        if let Some(user_id) = session.user_id {
            inner.by_user.entry(user_id).or_default().insert(connection_id);
        }
        inner.connections.insert(connection_id, Entry { session, tx });
    }

    /// Drop a connection from the global set and from every room it was in.
    /// Returns the rooms it occupied together with their remaining member
    /// snapshots, so the caller can re-broadcast membership.
    pub fn unregister(&self, connection_id: Uuid) -> Vec<(RoomId, Vec<RoomMember>)> {
        let mut inner = self.lock();

        let Some(entry) = inner.connections.remove(&connection_id) else {
            return Vec::new();
        };

        if let Some(user_id) = entry.session.user_id {
            if let Some(conns) = inner.by_user.get_mut(&user_id) {
                conns.remove(&connection_id);
                if conns.is_empty() {
                    inner.by_user.remove(&user_id);
                }
            }
        }

        let mut affected = Vec::new();
        inner.rooms.retain(|room, members| {
            if members.remove(&connection_id) {
                affected.push(*room);
            }
            !members.is_empty()
        });

        affected
            .into_iter()
            .map(|room| (room, snapshot(&inner, room)))
            .collect()
    }

    /// Idempotent: joining a room twice does not duplicate the membership.
    /// Returns the member snapshot after the join, or `None` for an unknown
    /// connection.
    pub fn join_room(&self, room: RoomId, connection_id: Uuid) -> Option<Vec<RoomMember>> {
        let mut inner = self.lock();
        if !inner.connections.contains_key(&connection_id) {
            return None;
        }
        inner.rooms.entry(room).or_default().insert(connection_id);
        Some(snapshot(&inner, room))
    }

    pub fn leave_room(&self, room: RoomId, connection_id: Uuid) -> Option<Vec<RoomMember>> {
        let mut inner = self.lock();
        let members = inner.rooms.get_mut(&room)?;
        members.remove(&connection_id);
        if members.is_empty() {
            inner.rooms.remove(&room);
        }
        Some(snapshot(&inner, room))
    }

    pub fn members_of(&self, room: RoomId) -> Vec<RoomMember> {
        let inner = self.lock();
        snapshot(&inner, room)
    }

    pub fn session(&self, connection_id: Uuid) -> Option<Session> {
        let inner = self.lock();
        inner
            .connections
            .get(&connection_id)
            .map(|entry| entry.session.clone())
    }

    pub fn is_user_online(&self, user_id: Uuid) -> bool {
        let inner = self.lock();
        inner.by_user.contains_key(&user_id)
    }

    pub fn connections_for(&self, user_id: Uuid) -> Vec<Uuid> {
        let inner = self.lock();
        inner
            .by_user
            .get(&user_id)
            .map(|conns| conns.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn set_locale(&self, connection_id: Uuid, locale: &str) {
        let mut inner = self.lock();
        if let Some(entry) = inner.connections.get_mut(&connection_id) {
            entry.session.locale = locale.to_string();
        }
    }

    // -- Delivery --
    //
    // A send to a connection that disappeared mid-operation is skipped, not
    // an error: the rx half died with the socket task.

    pub fn send_to_connection(&self, connection_id: Uuid, event: &ServerEvent) {
        let inner = self.lock();
        if let Some(entry) = inner.connections.get(&connection_id) {
            let _ = entry.tx.send(event.clone());
        }
    }

    pub fn send_to_room(&self, room: RoomId, event: &ServerEvent) {
        let inner = self.lock();
        if let Some(members) = inner.rooms.get(&room) {
            for connection_id in members {
                if let Some(entry) = inner.connections.get(connection_id) {
                    let _ = entry.tx.send(event.clone());
                }
            }
        }
    }

    pub fn send_to_room_except(&self, room: RoomId, skip: Uuid, event: &ServerEvent) {
        let inner = self.lock();
        if let Some(members) = inner.rooms.get(&room) {
            for connection_id in members {
                if *connection_id == skip {
                    continue;
                }
                if let Some(entry) = inner.connections.get(connection_id) {
                    let _ = entry.tx.send(event.clone());
                }
            }
        }
    }

    pub fn send_to_user(&self, user_id: Uuid, event: &ServerEvent) {
        let inner = self.lock();
        if let Some(conns) = inner.by_user.get(&user_id) {
            for connection_id in conns {
                if let Some(entry) = inner.connections.get(connection_id) {
                    let _ = entry.tx.send(event.clone());
                }
            }
        }
    }

    pub fn send_to_admins(&self, event: &ServerEvent) {
        let inner = self.lock();
        for entry in inner.connections.values() {
            if entry.session.role == Role::Admin {
                let _ = entry.tx.send(event.clone());
            }
        }
    }

    pub fn broadcast_all(&self, event: &ServerEvent) {
        let inner = self.lock();
        for entry in inner.connections.values() {
            let _ = entry.tx.send(event.clone());
        }
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot(inner: &Inner, room: RoomId) -> Vec<RoomMember> {
    inner
        .rooms
        .get(&room)
        .map(|members| {
            members
                .iter()
                .filter_map(|id| inner.connections.get(id))
                .map(|entry| RoomMember::from(&entry.session))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_types::models::RoomKind;

    fn session(role: Role, user_id: Option<Uuid>) -> Session {
        Session {
            connection_id: Uuid::new_v4(),
            user_id,
            role,
            display_name: "tester".into(),
            locale: "en".into(),
        }
    }

    fn register(registry: &PresenceRegistry, role: Role, user_id: Option<Uuid>) -> Uuid {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session {
            connection_id: Uuid::new_v4(),
            user_id,
            role,
            display_name: "tester".into(),
            locale: "en".into(),
        };
        let id = session.connection_id;
        registry.register(session, tx);
        id
    }

    #[test]
    fn join_is_idempotent() {
        let registry = PresenceRegistry::new();
        let conn = register(&registry, Role::User, Some(Uuid::new_v4()));
        let room = RoomId::new(RoomKind::Live, Uuid::new_v4());

        registry.join_room(room, conn);
        registry.join_room(room, conn);

        assert_eq!(registry.members_of(room).len(), 1);
    }

    #[test]
    fn unknown_connections_cannot_join() {
        let registry = PresenceRegistry::new();
        let room = RoomId::new(RoomKind::Live, Uuid::new_v4());
        assert!(registry.join_room(room, Uuid::new_v4()).is_none());
        assert!(registry.members_of(room).is_empty());
    }

    #[test]
    fn unregister_prunes_every_room() {
        let registry = PresenceRegistry::new();
        let conn = register(&registry, Role::User, Some(Uuid::new_v4()));
        let other = register(&registry, Role::User, None);

        let room_a = RoomId::new(RoomKind::Live, Uuid::new_v4());
        let room_b = RoomId::new(RoomKind::Bubble, Uuid::new_v4());
        registry.join_room(room_a, conn);
        registry.join_room(room_b, conn);
        registry.join_room(room_a, other);

        let affected = registry.unregister(conn);
        assert_eq!(affected.len(), 2);

        assert!(registry.members_of(room_a).iter().all(|m| m.connection_id != conn));
        assert!(registry.members_of(room_b).is_empty());
        assert_eq!(registry.members_of(room_a).len(), 1);
    }

    #[test]
    fn user_index_tracks_multiple_connections() {
        let registry = PresenceRegistry::new();
        let user_id = Uuid::new_v4();
        let first = register(&registry, Role::User, Some(user_id));
        let second = register(&registry, Role::User, Some(user_id));

        assert!(registry.is_user_online(user_id));
        assert_eq!(registry.connections_for(user_id).len(), 2);

        registry.unregister(first);
        assert!(registry.is_user_online(user_id));

        registry.unregister(second);
        assert!(!registry.is_user_online(user_id));
        assert!(registry.connections_for(user_id).is_empty());
    }

    #[test]
    fn targeted_send_reaches_only_the_user() {
        let registry = PresenceRegistry::new();
        let user_id = Uuid::new_v4();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(session(Role::User, Some(user_id)), tx_a);
        registry.register(session(Role::User, Some(Uuid::new_v4())), tx_b);

        registry.send_to_user(user_id, &ServerEvent::RefreshConversationLists);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn set_locale_updates_the_session() {
        let registry = PresenceRegistry::new();
        let conn = register(&registry, Role::Guest, None);

        registry.set_locale(conn, "de");
        assert_eq!(registry.session(conn).unwrap().locale, "de");
    }
}
