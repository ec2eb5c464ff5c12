//! Domain model structs persisted in the data file.
//!
//! The whole file is one [`Snapshot`]; its JSON shape is
//! `{ users: {name: User}, groups: {name: Group} }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Global role of an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::User => f.write_str("user"),
        }
    }
}

/// An account, keyed by username in [`Snapshot::users`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Argon2 PHC string, or an unsalted SHA-256 hex digest in older files.
    pub password: String,
    pub email: String,
    pub role: Role,
    /// Received direct messages, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl User {
    pub fn new(password_hash: String, email: String, role: Role) -> Self {
        Self {
            password: password_hash,
            email,
            role,
            messages: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A direct or group message. The sender is recorded verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    #[serde(default)]
    pub text: String,
}

impl Message {
    pub fn new(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A group conversation, keyed by name in [`Snapshot::groups`].
///
/// `members` keeps insertion order and may hold duplicates after repeated
/// invites. `admins` is always a subset of `members`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub members: Vec<String>,
    pub admins: Vec<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Stored as given, never interpreted.
    #[serde(default)]
    pub privacy: String,
}

impl Group {
    /// A fresh group whose creator is its only member and admin.
    pub fn new(creator: &str, privacy: String) -> Self {
        Self {
            members: vec![creator.to_string()],
            admins: vec![creator.to_string()],
            messages: Vec::new(),
            privacy,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The complete persisted state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    #[serde(default)]
    pub groups: BTreeMap<String, Group>,
}

// ---------------------------------------------------------------------------
// Group actions
// ---------------------------------------------------------------------------

/// A membership or messaging action performed inside a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAction {
    Invite { target: String },
    Promote { target: String },
    Demote { target: String },
    Kick { target: String },
    Send { text: String },
    /// An action name the server does not recognise. Rejected only after
    /// the group and membership checks.
    Unknown(String),
}

impl GroupAction {
    /// Build an action from its wire name. Fields the action does not use
    /// are ignored.
    pub fn parse(action: &str, target: &str, text: &str) -> Self {
        let target = target.to_string();
        match action {
            "invite" => GroupAction::Invite { target },
            "promote" => GroupAction::Promote { target },
            "demote" => GroupAction::Demote { target },
            "kick" => GroupAction::Kick { target },
            "send" => GroupAction::Send {
                text: text.to_string(),
            },
            other => GroupAction::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GroupAction::Invite { .. } => "invite",
            GroupAction::Promote { .. } => "promote",
            GroupAction::Demote { .. } => "demote",
            GroupAction::Kick { .. } => "kick",
            GroupAction::Send { .. } => "send",
            GroupAction::Unknown(name) => name,
        }
    }
}
