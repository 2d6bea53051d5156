//! Relay protocol for collaboration.
//!
//! Transport is left to the host: [`SyncSession`] only produces outgoing
//! JSON strings and consumes incoming ones. Document changes travel as
//! base64-encoded Loro updates; presence travels as plain JSON and never
//! touches the document.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::crdt::{CrdtStore, VersionVector};
use crate::presence::{Member, Presence, UserInfo};
use crate::store::DiagramStore;

/// Messages sent to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room
    Join {
        room: String,
        connection_id: u64,
        info: UserInfo,
    },
    /// Leave current room
    Leave,
    /// Document updates (base64 encoded Loro bytes)
    Sync { data: String },
    /// Own selection and cursor
    Presence {
        connection_id: u64,
        presence: Presence,
    },
}

/// Messages received from the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join with the members already there
    Joined {
        room: String,
        #[serde(default)]
        members: Vec<Member>,
        /// Room state so far, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_sync: Option<String>,
    },
    PeerJoined { member: Member },
    PeerLeft { connection_id: u64 },
    /// Document updates from another peer
    Sync { from: u64, data: String },
    Presence {
        connection_id: u64,
        presence: Presence,
    },
    Error { message: String },
}

/// What an incoming message did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    JoinedRoom { room: String, member_count: usize },
    PeerJoined { connection_id: u64 },
    PeerLeft { connection_id: u64 },
    /// Remote document changes were merged
    SyncReceived { from: u64 },
    PresenceReceived { connection_id: u64 },
    Error { message: String },
}

/// One client's side of a relay connection.
#[derive(Debug, Default)]
pub struct SyncSession {
    room: Option<String>,
    outgoing: Vec<String>,
    /// Document version already sent to the room.
    sent_version: VersionVector,
    /// Presence last sent to the room.
    sent_presence: Option<Presence>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn is_in_room(&self) -> bool {
        self.room.is_some()
    }

    /// Queue a join request announcing the local user.
    pub fn join(&mut self, room: &str, store: &CrdtStore) {
        let me = store.me();
        self.queue(&ClientMessage::Join {
            room: room.to_string(),
            connection_id: me.connection_id,
            info: me.info.clone(),
        });
    }

    /// Queue a leave request and forget everyone else.
    pub fn leave(&mut self, store: &mut CrdtStore) {
        if self.room.take().is_none() {
            return;
        }
        self.queue(&ClientMessage::Leave);
        let others: Vec<u64> = store.others().iter().map(|m| m.connection_id).collect();
        for connection_id in others {
            store.roster_mut().remove_other(connection_id);
        }
        self.sent_presence = None;
    }

    /// Drain pending outgoing messages.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn queue(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to encode sync message: {e}"),
        }
    }

    /// Queue document changes made since the last broadcast.
    pub fn broadcast_updates(&mut self, store: &CrdtStore) {
        if self.room.is_none() {
            return;
        }
        let version = store.version();
        if version == self.sent_version {
            return;
        }
        let updates = store.export_updates(&self.sent_version);
        self.queue(&ClientMessage::Sync {
            data: BASE64.encode(updates),
        });
        self.sent_version = version;
    }

    /// Queue own presence if it changed since the last broadcast.
    pub fn sync_presence(&mut self, store: &CrdtStore) {
        if self.room.is_none() {
            return;
        }
        let presence = store.presence();
        if self.sent_presence.as_ref() == Some(presence) {
            return;
        }
        let msg = ClientMessage::Presence {
            connection_id: store.me().connection_id,
            presence: presence.clone(),
        };
        self.sent_presence = Some(presence.clone());
        self.queue(&msg);
    }

    /// Merge remote document updates. Skips re-sending them when nothing
    /// local is pending.
    fn import(&mut self, store: &mut CrdtStore, data: &str) -> bool {
        let bytes = match BASE64.decode(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Dropping sync message with bad payload: {e}");
                return false;
            }
        };
        let up_to_date = store.version() == self.sent_version;
        if let Err(e) = store.import(&bytes) {
            log::warn!("Failed to import remote updates: {e}");
            return false;
        }
        if up_to_date {
            self.sent_version = store.version();
        }
        true
    }

    /// Handle an incoming relay message.
    pub fn handle_message(&mut self, store: &mut CrdtStore, json: &str) -> Option<SyncEvent> {
        let msg: ServerMessage = match serde_json::from_str(json) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Ignoring unknown relay message: {e}");
                return None;
            }
        };

        match msg {
            ServerMessage::Joined {
                room,
                members,
                initial_sync,
            } => {
                log::info!("Joined room {room} with {} other members", members.len());
                self.room = Some(room.clone());
                for member in members {
                    store.roster_mut().upsert_other(member);
                }
                if let Some(data) = initial_sync {
                    self.import(store, &data);
                }
                Some(SyncEvent::JoinedRoom {
                    room,
                    member_count: store.others().len(),
                })
            }
            ServerMessage::PeerJoined { member } => {
                let connection_id = member.connection_id;
                log::info!("{} joined", member.info.name);
                store.roster_mut().upsert_other(member);
                // Newcomers need our presence even if it has not changed.
                self.sent_presence = None;
                Some(SyncEvent::PeerJoined { connection_id })
            }
            ServerMessage::PeerLeft { connection_id } => {
                store.roster_mut().remove_other(connection_id);
                Some(SyncEvent::PeerLeft { connection_id })
            }
            ServerMessage::Sync { from, data } => self
                .import(store, &data)
                .then_some(SyncEvent::SyncReceived { from }),
            ServerMessage::Presence {
                connection_id,
                presence,
            } => {
                store.roster_mut().update_other_presence(connection_id, presence);
                Some(SyncEvent::PresenceReceived { connection_id })
            }
            ServerMessage::Error { message } => {
                log::warn!("Relay error: {message}");
                Some(SyncEvent::Error { message })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{EntityLayer, Layer};
    use kurbo::Point;

    fn joined(session: &mut SyncSession, store: &mut CrdtStore) {
        let msg = ServerMessage::Joined {
            room: "sala".into(),
            members: Vec::new(),
            initial_sync: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        session.handle_message(store, &json);
    }

    /// Turn a client message into what the relay forwards to others.
    fn relay(from: u64, json: &str) -> Option<String> {
        let forwarded = match serde_json::from_str::<ClientMessage>(json).unwrap() {
            ClientMessage::Sync { data } => ServerMessage::Sync { from, data },
            ClientMessage::Presence {
                connection_id,
                presence,
            } => ServerMessage::Presence {
                connection_id,
                presence,
            },
            _ => return None,
        };
        Some(serde_json::to_string(&forwarded).unwrap())
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&ClientMessage::Sync { data: "AAE=".into() }).unwrap();
        assert_eq!(json, r#"{"type":"sync","data":"AAE="}"#);
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"peer_left","connection_id":4}"#).unwrap();
        assert_eq!(msg, ServerMessage::PeerLeft { connection_id: 4 });
    }

    #[test]
    fn test_nothing_sent_outside_a_room() {
        let mut session = SyncSession::new();
        let mut store = CrdtStore::new();
        store
            .insert("a".into(), Layer::Entity(EntityLayer::with_defaults(Point::ORIGIN, 1.0, 1.0)))
            .unwrap();
        session.broadcast_updates(&store);
        session.sync_presence(&store);
        assert!(!session.has_outgoing());

        session.join("sala", &store);
        let out = session.take_outgoing();
        assert_eq!(out.len(), 1);
        assert!(out[0].contains(r#""type":"join""#));
    }

    #[test]
    fn test_updates_reach_other_peer() {
        let (mut a, mut b) = (CrdtStore::new(), CrdtStore::new());
        let (mut sa, mut sb) = (SyncSession::new(), SyncSession::new());
        joined(&mut sa, &mut a);
        joined(&mut sb, &mut b);

        a.insert("x".into(), Layer::Entity(EntityLayer::with_defaults(Point::new(5.0, 5.0), 10.0, 10.0)))
            .unwrap();
        sa.broadcast_updates(&a);
        // Nothing changed since.
        sa.broadcast_updates(&a);
        let out = sa.take_outgoing();
        assert_eq!(out.len(), 1);

        let forwarded = relay(a.peer_id(), &out[0]).unwrap();
        let event = sb.handle_message(&mut b, &forwarded);
        assert_eq!(event, Some(SyncEvent::SyncReceived { from: a.peer_id() }));
        assert_eq!(b.layer("x"), a.layer("x"));

        // Merged remote changes are not echoed back.
        sb.broadcast_updates(&b);
        assert!(!sb.has_outgoing());
    }

    #[test]
    fn test_presence_only_when_changed() {
        let (mut a, mut b) = (CrdtStore::new(), CrdtStore::new());
        let (mut sa, mut sb) = (SyncSession::new(), SyncSession::new());
        joined(&mut sa, &mut a);
        joined(&mut sb, &mut b);

        a.set_selection(vec!["x".into()]);
        a.set_cursor(Some(Point::new(1.0, 2.0)));
        sa.sync_presence(&a);
        sa.sync_presence(&a);
        let out = sa.take_outgoing();
        assert_eq!(out.len(), 1);

        let forwarded = relay(a.peer_id(), &out[0]).unwrap();
        sb.handle_message(&mut b, &forwarded);
        assert_eq!(b.others().len(), 1);
        assert_eq!(b.others()[0].presence.selection, vec!["x".to_string()]);
        assert_eq!(b.roster_mut().selected_by_others("x").count(), 1);
    }

    #[test]
    fn test_peer_lifecycle() {
        let mut store = CrdtStore::new();
        let mut session = SyncSession::new();
        joined(&mut session, &mut store);

        let member = Member::new(
            42,
            UserInfo {
                name: "Ana".into(),
                avatar: None,
            },
        );
        let json = serde_json::to_string(&ServerMessage::PeerJoined { member }).unwrap();
        assert_eq!(
            session.handle_message(&mut store, &json),
            Some(SyncEvent::PeerJoined { connection_id: 42 })
        );
        assert_eq!(store.others()[0].info.name, "Ana");

        let json = serde_json::to_string(&ServerMessage::PeerLeft { connection_id: 42 }).unwrap();
        session.handle_message(&mut store, &json);
        assert!(store.others().is_empty());
    }

    #[test]
    fn test_bad_messages_are_ignored() {
        let mut store = CrdtStore::new();
        let mut session = SyncSession::new();
        assert_eq!(session.handle_message(&mut store, "not json"), None);
        assert_eq!(
            session.handle_message(&mut store, r#"{"type":"sync","from":1,"data":"@@@"}"#),
            None
        );
    }

    #[test]
    fn test_leave_clears_roster() {
        let mut store = CrdtStore::new();
        let mut session = SyncSession::new();
        joined(&mut session, &mut store);
        store.roster_mut().update_other_presence(9, Presence::default());
        session.leave(&mut store);
        assert!(!session.is_in_room());
        assert!(store.others().is_empty());
        assert_eq!(session.take_outgoing(), vec![r#"{"type":"leave"}"#.to_string()]);
    }
}
