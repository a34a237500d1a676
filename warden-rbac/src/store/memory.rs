//! In-memory policy store

use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::RwLock;

use super::PolicyStore;
use crate::{
    error::RbacResult,
    models::{GrantTuple, MembershipTuple, Permission},
};

#[derive(Debug, Default)]
struct PolicyState {
    grants: BTreeSet<GrantTuple>,
    memberships: BTreeSet<MembershipTuple>,
}

/// Policy store kept entirely in process memory.
///
/// Used when no database is configured and throughout the tests.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    state: RwLock<PolicyState>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of grant and membership tuples held
    #[cfg(test)]
    pub(crate) async fn counts(&self) -> (usize, usize) {
        let state = self.state.read().await;
        (state.grants.len(), state.memberships.len())
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn grants_for(&self, subject: &str) -> RbacResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(state
            .grants
            .iter()
            .filter(|grant| grant.subject == subject)
            .map(GrantTuple::permission)
            .collect())
    }

    async fn all_grants(&self) -> RbacResult<Vec<GrantTuple>> {
        let state = self.state.read().await;
        Ok(state.grants.iter().cloned().collect())
    }

    async fn add_grants(&self, subject: &str, permissions: &[Permission]) -> RbacResult<usize> {
        let mut state = self.state.write().await;
        let inserted = permissions
            .iter()
            .filter(|perm| state.grants.insert(GrantTuple::new(subject, (*perm).clone())))
            .count();
        Ok(inserted)
    }

    async fn remove_grant(&self, subject: &str, permission: &Permission) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .grants
            .remove(&GrantTuple::new(subject, permission.clone())))
    }

    async fn remove_subject_grants(&self, subject: &str) -> RbacResult<usize> {
        let mut state = self.state.write().await;
        let before = state.grants.len();
        state.grants.retain(|grant| grant.subject != subject);
        Ok(before - state.grants.len())
    }

    async fn roles_for(&self, user: &str) -> RbacResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.user == user)
            .map(|m| m.role.clone())
            .collect())
    }

    async fn users_for_role(&self, role: &str) -> RbacResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.role == role)
            .map(|m| m.user.clone())
            .collect())
    }

    async fn add_memberships(&self, user: &str, roles: &[String]) -> RbacResult<usize> {
        let mut state = self.state.write().await;
        let inserted = roles
            .iter()
            .filter(|role| {
                state
                    .memberships
                    .insert(MembershipTuple::new(user, role.as_str()))
            })
            .count();
        Ok(inserted)
    }

    async fn remove_membership(&self, user: &str, role: &str) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.memberships.remove(&MembershipTuple::new(user, role)))
    }

    async fn remove_user_memberships(&self, user: &str) -> RbacResult<usize> {
        let mut state = self.state.write().await;
        let before = state.memberships.len();
        state.memberships.retain(|m| m.user != user);
        Ok(before - state.memberships.len())
    }

    async fn remove_role_memberships(&self, role: &str) -> RbacResult<usize> {
        let mut state = self.state.write().await;
        let before = state.memberships.len();
        state.memberships.retain(|m| m.role != role);
        Ok(before - state.memberships.len())
    }

    async fn is_empty(&self) -> RbacResult<bool> {
        let state = self.state.read().await;
        Ok(state.grants.is_empty() && state.memberships.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_grants_are_skipped() {
        let store = MemoryPolicyStore::new();
        let perms = vec![
            Permission::api("/docs", "GET"),
            Permission::api("/docs", "GET"),
            Permission::api("/docs", "POST"),
        ];

        assert_eq!(store.add_grants("editor", &perms).await.unwrap(), 2);
        assert_eq!(store.add_grants("editor", &perms).await.unwrap(), 0);
        assert_eq!(store.grants_for("editor").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memberships() {
        let store = MemoryPolicyStore::new();
        let roles = vec!["editor".to_string(), "viewer".to_string()];

        assert_eq!(store.add_memberships("7", &roles).await.unwrap(), 2);
        assert_eq!(store.add_memberships("7", &roles).await.unwrap(), 0);
        assert_eq!(store.roles_for("7").await.unwrap(), roles);
        assert_eq!(store.users_for_role("viewer").await.unwrap(), vec!["7"]);

        assert!(store.remove_membership("7", "viewer").await.unwrap());
        assert!(!store.remove_membership("7", "viewer").await.unwrap());
        assert_eq!(store.remove_user_memberships("7").await.unwrap(), 1);
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_subject_and_role_cascade() {
        let store = MemoryPolicyStore::new();
        store
            .add_grants("editor", &[Permission::menu_read("/x")])
            .await
            .unwrap();
        store
            .add_grants("viewer", &[Permission::menu_read("/y")])
            .await
            .unwrap();
        store
            .add_memberships("1", &["editor".to_string()])
            .await
            .unwrap();
        store
            .add_memberships("2", &["editor".to_string(), "viewer".to_string()])
            .await
            .unwrap();

        assert_eq!(store.remove_subject_grants("editor").await.unwrap(), 1);
        assert_eq!(store.remove_role_memberships("editor").await.unwrap(), 2);
        assert_eq!(store.counts().await, (1, 1));
        assert_eq!(store.all_grants().await.unwrap()[0].subject, "viewer");
    }
}
