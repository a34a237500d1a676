//! Policy tuple storage
//!
//! The store holds grant tuples `(subject, resource, action)` and membership
//! tuples `(user, role)`. Subjects arrive here already collapsed to their
//! policy key (see [`crate::models::Subject::policy_key`]). Stores never check
//! whether a subject exists; that is the caller's job.

mod memory;
mod seaorm;

pub use memory::MemoryPolicyStore;
pub use seaorm::{entity as policy_rules, SeaOrmPolicyStore};

use async_trait::async_trait;

use crate::{
    error::RbacResult,
    models::{GrantTuple, Permission},
};

/// Durable store of grant and membership tuples
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Direct grants held by a subject
    async fn grants_for(&self, subject: &str) -> RbacResult<Vec<Permission>>;

    /// Every grant tuple in the store
    async fn all_grants(&self) -> RbacResult<Vec<GrantTuple>>;

    /// Insert grants as one batch, skipping tuples that already exist.
    /// Returns the number of tuples inserted.
    async fn add_grants(&self, subject: &str, permissions: &[Permission]) -> RbacResult<usize>;

    /// Remove a single grant. Returns whether a tuple was removed.
    async fn remove_grant(&self, subject: &str, permission: &Permission) -> RbacResult<bool>;

    /// Remove every grant held by a subject
    async fn remove_subject_grants(&self, subject: &str) -> RbacResult<usize>;

    /// Roles a user is a member of
    async fn roles_for(&self, user: &str) -> RbacResult<Vec<String>>;

    /// Users holding a role
    async fn users_for_role(&self, role: &str) -> RbacResult<Vec<String>>;

    /// Insert memberships as one batch, skipping existing ones
    async fn add_memberships(&self, user: &str, roles: &[String]) -> RbacResult<usize>;

    /// Remove a single membership
    async fn remove_membership(&self, user: &str, role: &str) -> RbacResult<bool>;

    /// Remove every membership of a user
    async fn remove_user_memberships(&self, user: &str) -> RbacResult<usize>;

    /// Remove every membership naming a role
    async fn remove_role_memberships(&self, role: &str) -> RbacResult<usize>;

    /// Whether the store holds no tuples at all
    async fn is_empty(&self) -> RbacResult<bool>;
}
