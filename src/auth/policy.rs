//! Role/ownership decision matrix.
//!
//! Every rule that governs who may read, create, change or delete a resource
//! lives here as a pure function over the actor and the target, so route
//! handlers all consume the same matrix instead of re-deriving it inline.
//! Functions that take a target receive it as an `Option`: `None` means the
//! resource id did not resolve, and the decision is `NotFound` before any
//! permission question is asked.

use crate::db::models::Role;
use crate::error::AppError;

/// Account id of the seeded general administrator. This account's role can
/// never change, it can never be deleted, and it alone may demote other
/// admins.
pub const GENERAL_ADMIN_ID: i64 = 1;

/// The authenticated identity a decision is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Forbidden,
    NotFound,
}

impl Decision {
    /// Convert into a handler result. Callers apply this before executing any
    /// mutating statement.
    pub fn check(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Forbidden => Err(AppError::Forbidden),
            Decision::NotFound => Err(AppError::NotFound),
        }
    }
}

fn admin_only(actor: &Actor) -> Decision {
    if actor.is_admin() {
        Decision::Allow
    } else {
        Decision::Forbidden
    }
}

/// Read access to categories, posts and comments. Nothing is author-private;
/// authentication alone (already established by the extractor) suffices.
pub fn view(_actor: &Actor) -> Decision {
    Decision::Allow
}

/// Creating posts and comments. Any authenticated actor may; the author id
/// is bound to the actor by the service, never taken from the request.
pub fn create_content(_actor: &Actor) -> Decision {
    Decision::Allow
}

/// Deleting a post: its author or any admin. `owner` is the post's author id.
pub fn delete_post(actor: &Actor, owner: Option<i64>) -> Decision {
    delete_owned(actor, owner)
}

/// Deleting a comment: its author or any admin.
pub fn delete_comment(actor: &Actor, owner: Option<i64>) -> Decision {
    delete_owned(actor, owner)
}

fn delete_owned(actor: &Actor, owner: Option<i64>) -> Decision {
    let Some(owner) = owner else {
        return Decision::NotFound;
    };
    if actor.id == owner || actor.is_admin() {
        Decision::Allow
    } else {
        Decision::Forbidden
    }
}

/// Creating and deleting categories is admin-only.
pub fn manage_categories(actor: &Actor) -> Decision {
    admin_only(actor)
}

/// Listing all accounts is admin-only.
pub fn list_accounts(actor: &Actor) -> Decision {
    admin_only(actor)
}

/// Deleting an account: admins only, never the general administrator, never
/// the actor's own account.
pub fn delete_account(actor: &Actor, target: Option<i64>) -> Decision {
    let Some(target) = target else {
        return Decision::NotFound;
    };
    if !actor.is_admin() {
        return Decision::Forbidden;
    }
    if target == GENERAL_ADMIN_ID || target == actor.id {
        return Decision::Forbidden;
    }
    Decision::Allow
}

/// Changing an account's role. `target` is the account's (id, current role).
/// Admins only; the general administrator's role is immutable; no admin may
/// demote itself; and only the general administrator may demote another
/// admin.
pub fn change_role(actor: &Actor, target: Option<(i64, Role)>, new_role: Role) -> Decision {
    let Some((target_id, target_role)) = target else {
        return Decision::NotFound;
    };
    if !actor.is_admin() {
        return Decision::Forbidden;
    }
    if target_id == GENERAL_ADMIN_ID {
        return Decision::Forbidden;
    }
    if target_id == actor.id && new_role == Role::Normal {
        return Decision::Forbidden;
    }
    if target_role == Role::Admin && new_role == Role::Normal && actor.id != GENERAL_ADMIN_ID {
        return Decision::Forbidden;
    }
    Decision::Allow
}
