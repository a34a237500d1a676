//! Authorization decisions over the policy store

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::{
    error::RbacResult,
    models::{Permission, Subject, UserId},
    roles::RoleSlug,
    store::PolicyStore,
};

/// Handle to the policy store that every consumer shares.
///
/// All reads go through the read half of one lock and every mutation through
/// the write half, so a decision never observes a reconciliation half-applied.
/// Permission sets are resolved from the store on each call and never cached.
#[derive(Clone)]
pub struct RbacEnforcer {
    store: Arc<RwLock<Box<dyn PolicyStore>>>,
    super_admin: UserId,
}

impl RbacEnforcer {
    /// Create a new enforcer over a store
    pub fn new(store: impl PolicyStore + 'static, super_admin: UserId) -> Self {
        Self::from_boxed(Box::new(store), super_admin)
    }

    pub fn from_boxed(store: Box<dyn PolicyStore>, super_admin: UserId) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            super_admin,
        }
    }

    pub fn super_admin(&self) -> UserId {
        self.super_admin
    }

    /// Whether the subject is the reserved super-admin identity
    pub fn is_super_admin(&self, subject: &Subject) -> bool {
        matches!(subject, Subject::User(id) if *id == self.super_admin)
    }

    /// May `subject` perform `action` on `resource`?
    ///
    /// Matching is exact on the resource key. Any `Err` must be treated as a
    /// denial by the caller.
    pub async fn enforce(&self, subject: &Subject, resource: &str, action: &str) -> RbacResult<bool> {
        if self.is_super_admin(subject) {
            return Ok(true);
        }

        let store = self.store.read().await;
        let allowed = match resolve_implicit(store.as_ref(), subject).await {
            Ok(permissions) => permissions.iter().any(|p| p.matches(resource, action)),
            Err(e) => {
                tracing::warn!(%subject, resource, action, error = %e, "Policy store failed during enforcement");
                return Err(e);
            }
        };

        tracing::debug!(%subject, resource, action, allowed, "Authorization decision");
        Ok(allowed)
    }

    /// Direct grants plus grants of every role held
    pub async fn implicit_permissions(&self, subject: &Subject) -> RbacResult<BTreeSet<Permission>> {
        let store = self.store.read().await;
        resolve_implicit(store.as_ref(), subject).await
    }

    /// Direct grants only
    pub async fn permissions_for(&self, subject: &Subject) -> RbacResult<BTreeSet<Permission>> {
        let store = self.store.read().await;
        let grants = store.grants_for(&subject.policy_key()).await?;
        Ok(grants.into_iter().collect())
    }

    /// Role slugs a user holds
    pub async fn roles_for_user(&self, user: UserId) -> RbacResult<BTreeSet<String>> {
        let store = self.store.read().await;
        let roles = store.roles_for(&Subject::User(user).policy_key()).await?;
        Ok(roles.into_iter().collect())
    }

    /// Users holding a role
    pub async fn users_for_role(&self, role: &RoleSlug) -> RbacResult<Vec<UserId>> {
        let store = self.store.read().await;
        let users = store.users_for_role(role.as_str()).await?;

        Ok(users
            .into_iter()
            .filter_map(|key| match Subject::from_policy_key(&key) {
                Subject::User(id) => Some(id),
                Subject::Role(_) => None,
            })
            .collect())
    }

    /// Paths of every menu grant issued to any role
    pub async fn authored_menu_paths(&self) -> RbacResult<BTreeSet<String>> {
        let store = self.store.read().await;
        let grants = store.all_grants().await?;

        Ok(grants
            .into_iter()
            .filter(|grant| Subject::from_policy_key(&grant.subject).is_role())
            .filter_map(|grant| grant.permission().menu_path().map(str::to_string))
            .collect())
    }

    /// Grant permissions to a subject
    pub async fn add_permissions(&self, subject: &Subject, permissions: &[Permission]) -> RbacResult<usize> {
        let store = self.store.write().await;
        store.add_grants(&subject.policy_key(), permissions).await
    }

    /// Add role memberships for a user
    pub async fn add_roles_for_user(&self, user: UserId, roles: &[RoleSlug]) -> RbacResult<usize> {
        let store = self.store.write().await;
        let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        store
            .add_memberships(&Subject::User(user).policy_key(), &roles)
            .await
    }

    /// Remove a role's grants and every membership naming it
    pub async fn delete_role(&self, role: &RoleSlug) -> RbacResult<RoleRemoval> {
        let store = self.store.write().await;
        let grants = store.remove_subject_grants(role.as_str()).await?;
        let memberships = store.remove_role_memberships(role.as_str()).await?;

        tracing::info!(role = %role, grants, memberships, "Removed role from policy store");
        Ok(RoleRemoval { grants, memberships })
    }

    /// Remove a user's memberships and direct grants
    pub async fn delete_user(&self, user: UserId) -> RbacResult<RoleRemoval> {
        let key = Subject::User(user).policy_key();
        let store = self.store.write().await;
        let memberships = store.remove_user_memberships(&key).await?;
        let grants = store.remove_subject_grants(&key).await?;

        tracing::info!(user, grants, memberships, "Removed user from policy store");
        Ok(RoleRemoval { grants, memberships })
    }

    pub async fn is_empty(&self) -> RbacResult<bool> {
        let store = self.store.read().await;
        store.is_empty().await
    }

    /// Exclusive access for reconciliation and seeding
    pub(crate) async fn write_store(&self) -> RwLockWriteGuard<'_, Box<dyn PolicyStore>> {
        self.store.write().await
    }
}

/// Tuples removed by a cascade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleRemoval {
    pub grants: usize,
    pub memberships: usize,
}

/// Resolve a subject's effective permission set against a store.
///
/// Users get their direct grants plus one level of role grants. Roles do not
/// hold other roles, so a role resolves to its direct grants.
pub(crate) async fn resolve_implicit(
    store: &dyn PolicyStore,
    subject: &Subject,
) -> RbacResult<BTreeSet<Permission>> {
    let key = subject.policy_key();
    let mut permissions: BTreeSet<Permission> = store.grants_for(&key).await?.into_iter().collect();

    if let Subject::User(_) = subject {
        for role in store.roles_for(&key).await? {
            permissions.extend(store.grants_for(&role).await?);
        }
    }

    Ok(permissions)
}
