//! Ephemeral per-user state: selection, cursor, and the collaborator roster.
//!
//! Presence never enters the durable document or the undo history. Each
//! client writes only its own [`Presence`]; everybody else's is read-only and
//! arrives through the sync session.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::layer::LayerId;

/// What a collaborator is currently pointing at and has selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    #[serde(default)]
    pub selection: Vec<LayerId>,
    #[serde(default)]
    pub cursor: Option<Point>,
}

/// Display info for a collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// One connected user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub connection_id: u64,
    #[serde(default)]
    pub info: UserInfo,
    #[serde(default)]
    pub presence: Presence,
}

impl Member {
    pub fn new(connection_id: u64, info: UserInfo) -> Self {
        Self {
            connection_id,
            info,
            presence: Presence::default(),
        }
    }
}

/// The local user plus everyone else in the room.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    me: Member,
    others: Vec<Member>,
}

impl Roster {
    pub fn new(me: Member) -> Self {
        Self {
            me,
            others: Vec::new(),
        }
    }

    pub fn me(&self) -> &Member {
        &self.me
    }

    /// Own presence; the only one this client may write.
    pub fn presence_mut(&mut self) -> &mut Presence {
        &mut self.me.presence
    }

    pub fn others(&self) -> &[Member] {
        &self.others
    }

    /// Insert or replace a remote member, keyed by connection id.
    pub fn upsert_other(&mut self, member: Member) {
        if member.connection_id == self.me.connection_id {
            return;
        }
        match self
            .others
            .iter_mut()
            .find(|m| m.connection_id == member.connection_id)
        {
            Some(existing) => *existing = member,
            None => self.others.push(member),
        }
    }

    /// Update a remote member's presence. Unknown members are added with
    /// empty display info.
    pub fn update_other_presence(&mut self, connection_id: u64, presence: Presence) {
        if connection_id == self.me.connection_id {
            return;
        }
        match self.others.iter_mut().find(|m| m.connection_id == connection_id) {
            Some(existing) => existing.presence = presence,
            None => self.others.push(Member {
                connection_id,
                info: UserInfo::default(),
                presence,
            }),
        }
    }

    pub fn remove_other(&mut self, connection_id: u64) -> Option<Member> {
        let idx = self
            .others
            .iter()
            .position(|m| m.connection_id == connection_id)?;
        Some(self.others.remove(idx))
    }

    /// Remote members whose selection contains `id`.
    pub fn selected_by_others<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Member> + 'a {
        self.others
            .iter()
            .filter(move |m| m.presence.selection.iter().any(|s| s == id))
    }
}
