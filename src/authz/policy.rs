//! Pure permission rules. No lookups happen here.

use std::fmt;

use crate::auth::user::{Principal, Role};
use crate::storage::{StoredComment, StoredPhotoshoot};

/// Any authenticated role
pub const ANY_ROLE: &[Role] = &[Role::Admin, Role::User];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Read, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a caller relates to one photoshoot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Relation {
    pub is_owner: bool,
    pub is_shared: bool,
    pub is_public: bool,
    pub is_admin: bool,
}

impl Relation {
    /// An ownerless photoshoot ignores its shared-with set: only public reads
    /// and admin actions apply.
    pub fn between(principal: &Principal, photoshoot: &StoredPhotoshoot) -> Self {
        let owned = photoshoot.owner_id.is_some();
        Self {
            is_owner: photoshoot.owner_id == Some(principal.id),
            is_shared: owned && photoshoot.shared_with.contains(&principal.id),
            is_public: photoshoot.public,
            is_admin: principal.is_admin(),
        }
    }

    pub fn can_read(&self) -> bool {
        self.is_owner || self.is_shared || self.is_public || self.is_admin
    }

    pub fn can_update(&self) -> bool {
        self.is_owner || self.is_admin
    }

    pub fn can_delete(&self) -> bool {
        self.is_owner || self.is_admin
    }

    pub fn permits(&self, action: Action) -> bool {
        match action {
            Action::Read => self.can_read(),
            Action::Update => self.can_update(),
            Action::Delete => self.can_delete(),
        }
    }
}

/// Only the author may change a comment's body; admins get no override here
pub fn can_edit_comment(principal: &Principal, comment: &StoredComment) -> bool {
    comment.author_id == principal.id
}

pub fn can_delete_comment(principal: &Principal, comment: &StoredComment) -> bool {
    comment.author_id == principal.id || principal.is_admin()
}
