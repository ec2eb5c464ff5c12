//! The state store.
//!
//! [`Store`] owns the in-memory [`Snapshot`] behind a single mutex. Each
//! mutation checks its preconditions against the live state, applies the
//! change to a working copy, writes that copy to disk and only then installs
//! it. A failed check or a failed write leaves memory and file untouched.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::authz::{is_bootstrap, is_global_admin, is_group_admin, is_member, BOOTSTRAP_USERNAME};
use crate::error::{Result, StoreError};
use crate::models::{Group, GroupAction, Message, Role, Snapshot, User};
use crate::password::{hash_password, is_legacy_hash, verify_password};
use crate::persist;

/// Credentials for the account created when no data file exists yet.
#[derive(Clone)]
pub struct Bootstrap {
    pub password: String,
    pub email: String,
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

pub struct Store {
    path: PathBuf,
    state: Mutex<Snapshot>,
}

impl Store {
    /// Open the data file at `path`, creating it with the bootstrap admin if
    /// it does not exist.
    ///
    /// The returned flag is `true` when the bootstrap account was created.
    pub fn open(path: impl Into<PathBuf>, bootstrap: &Bootstrap) -> Result<(Self, bool)> {
        let path = path.into();

        if let Some(snapshot) = persist::load(&path)? {
            info!(
                path = %path.display(),
                users = snapshot.users.len(),
                groups = snapshot.groups.len(),
                "opened existing data file"
            );
            return Ok((Self::with_snapshot(path, snapshot), false));
        }

        let mut snapshot = Snapshot::default();
        snapshot.users.insert(
            BOOTSTRAP_USERNAME.to_string(),
            User::new(
                hash_password(&bootstrap.password)?,
                bootstrap.email.clone(),
                Role::Admin,
            ),
        );
        persist::save(&path, &snapshot)?;

        info!(
            path = %path.display(),
            username = BOOTSTRAP_USERNAME,
            "created data file with bootstrap admin"
        );
        Ok((Self::with_snapshot(path, snapshot), true))
    }

    fn with_snapshot(path: PathBuf, snapshot: Snapshot) -> Self {
        Self {
            path,
            state: Mutex::new(snapshot),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run `mutate` on a copy of the state, persist the copy, then install it.
    fn commit<T>(&self, mutate: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let out = mutate(&mut working)?;

        if let Err(e) = persist::save(&self.path, &working) {
            error!(path = %self.path.display(), error = %e, "failed to persist snapshot");
            return Err(e);
        }

        *guard = working;
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Session / identity
    // -----------------------------------------------------------------------

    /// Check a username/password pair and return the account's role.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Role> {
        let (stored, role) = {
            let state = self.lock()?;
            let user = state
                .users
                .get(username)
                .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
            (user.password.clone(), user.role)
        };

        if !verify_password(password, &stored) {
            warn!(username, "rejected login: wrong password");
            return Err(StoreError::WrongPassword);
        }

        if is_legacy_hash(&stored) {
            self.upgrade_hash(username, password, &stored)?;
        }

        debug!(username, %role, "authenticated");
        Ok(role)
    }

    /// Replace a verified legacy digest with an Argon2 hash, unless the
    /// record changed since it was read.
    fn upgrade_hash(&self, username: &str, password: &str, legacy: &str) -> Result<()> {
        let upgraded = hash_password(password)?;
        let replaced = self.commit(|state| {
            Ok(match state.users.get_mut(username) {
                Some(user) if user.password == legacy => {
                    user.password = upgraded;
                    true
                }
                _ => false,
            })
        })?;

        if replaced {
            info!(username, "upgraded legacy password hash");
        }
        Ok(())
    }

    /// Create a regular account. `acting` must be a global admin.
    pub fn create_user(&self, acting: &str, username: &str, password: &str, email: &str) -> Result<()> {
        self.create_account(acting, username, password, email, Role::User)
    }

    /// Create an admin account. Only the bootstrap account may do this.
    pub fn create_admin(&self, acting: &str, username: &str, password: &str, email: &str) -> Result<()> {
        self.create_account(acting, username, password, email, Role::Admin)
    }

    fn create_account(
        &self,
        acting: &str,
        username: &str,
        password: &str,
        email: &str,
        role: Role,
    ) -> Result<()> {
        // Reject early so refused requests never pay for hashing; the check
        // runs again under the commit lock.
        {
            let state = self.lock()?;
            check_can_create(&*state, acting, username, role)?;
        }

        let hash = hash_password(password)?;
        self.commit(|state| {
            check_can_create(state, acting, username, role)?;
            state.users.insert(
                username.to_string(),
                User::new(hash, email.to_string(), role),
            );
            Ok(())
        })?;

        info!(acting, username, %role, "created account");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Direct messages
    // -----------------------------------------------------------------------

    /// Append a message to `to`'s inbox. `from` is stored as given and is
    /// not checked against existing accounts.
    pub fn send_direct_message(&self, from: &str, to: &str, text: &str) -> Result<()> {
        self.commit(|state| {
            let recipient = state
                .users
                .get_mut(to)
                .ok_or_else(|| StoreError::RecipientNotFound(to.to_string()))?;
            recipient.messages.push(Message::new(from, text));
            Ok(())
        })?;

        debug!(from, to, "direct message delivered");
        Ok(())
    }

    pub fn inbox(&self, username: &str) -> Result<Vec<Message>> {
        let state = self.lock()?;
        state
            .users
            .get(username)
            .map(|user| user.messages.clone())
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
    }

    /// Remove the message at `index`, shifting later messages down.
    pub fn delete_message(&self, username: &str, index: usize) -> Result<()> {
        self.commit(|state| {
            let user = state
                .users
                .get_mut(username)
                .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
            if index >= user.messages.len() {
                return Err(StoreError::InvalidIndex(index as i64));
            }
            user.messages.remove(index);
            Ok(())
        })?;

        debug!(username, index, "deleted direct message");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Create a group owned by `acting`, who must be a global admin.
    pub fn create_group(&self, acting: &str, name: &str, privacy: &str) -> Result<()> {
        self.commit(|state| {
            if !is_global_admin(state, acting) {
                return Err(StoreError::forbidden("Only admins can create groups"));
            }
            if state.groups.contains_key(name) {
                return Err(StoreError::GroupExists(name.to_string()));
            }
            state
                .groups
                .insert(name.to_string(), Group::new(acting, privacy.to_string()));
            Ok(())
        })?;

        info!(acting, group = name, privacy, "created group");
        Ok(())
    }

    /// Apply `action` to `group_name` on behalf of `actor`, who must be an
    /// existing account and a member of the group.
    pub fn group_action(&self, actor: &str, group_name: &str, action: &GroupAction) -> Result<()> {
        self.commit(|state| {
            let users = &state.users;
            let group = state
                .groups
                .get_mut(group_name)
                .ok_or_else(|| StoreError::GroupNotFound(group_name.to_string()))?;

            if !users.contains_key(actor) || !is_member(group, actor) {
                return Err(StoreError::forbidden("Not a member"));
            }

            match action {
                GroupAction::Invite { target } => {
                    require_group_admin(group, actor, action)?;
                    if !users.contains_key(target) {
                        return Err(StoreError::UserNotFound(target.clone()));
                    }
                    group.members.push(target.clone());
                }
                GroupAction::Promote { target } => {
                    require_group_admin(group, actor, action)?;
                    if !is_member(group, target) {
                        return Err(StoreError::forbidden("Target not in group"));
                    }
                    if !is_group_admin(group, target) {
                        group.admins.push(target.clone());
                    }
                }
                GroupAction::Demote { target } => {
                    require_group_admin(group, actor, action)?;
                    group.admins.retain(|a| a != target);
                }
                GroupAction::Kick { target } => {
                    require_group_admin(group, actor, action)?;
                    if is_group_admin(group, target) {
                        return Err(StoreError::forbidden("Cannot kick admin"));
                    }
                    group.members.retain(|m| m != target);
                }
                GroupAction::Send { text } => {
                    group.messages.push(Message::new(actor, text.as_str()));
                }
                GroupAction::Unknown(name) => {
                    return Err(StoreError::UnknownAction(name.clone()));
                }
            }
            Ok(())
        })?;

        debug!(actor, group = group_name, action = action.name(), "group action applied");
        Ok(())
    }

    /// The group's message log, readable by members only.
    pub fn group_messages(&self, group_name: &str, username: &str) -> Result<Vec<Message>> {
        let state = self.lock()?;
        let group = state
            .groups
            .get(group_name)
            .ok_or_else(|| StoreError::GroupNotFound(group_name.to_string()))?;
        if !is_member(group, username) {
            return Err(StoreError::forbidden("Not a member"));
        }
        Ok(group.messages.clone())
    }
}

fn require_group_admin(group: &Group, actor: &str, action: &GroupAction) -> Result<()> {
    if is_group_admin(group, actor) {
        Ok(())
    } else {
        Err(StoreError::Forbidden(format!(
            "Only group admins can {}",
            action.name()
        )))
    }
}

fn check_can_create(state: &Snapshot, acting: &str, username: &str, role: Role) -> Result<()> {
    match role {
        Role::Admin if !is_bootstrap(acting) => {
            return Err(StoreError::forbidden("Only mainadmin can create admins"));
        }
        Role::User if !is_global_admin(state, acting) => {
            return Err(StoreError::forbidden("Only admins can create users"));
        }
        _ => {}
    }
    if state.users.contains_key(username) {
        return Err(StoreError::UserExists(username.to_string()));
    }
    Ok(())
}
