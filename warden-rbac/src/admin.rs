//! Administrative operations over roles, users and menus
//!
//! Existence checks against the record store happen here, before any policy
//! write. The policy store itself accepts tuples for any subject.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    config::RbacConfig,
    enforcer::{RbacEnforcer, RoleRemoval},
    error::{RbacError, RbacResult},
    menu::MenuVisibilityResolver,
    models::{MenuNode, Permission, Role, Subject, UserId},
    reconcile::{PermissionReconciler, RoleAssignmentReconciler, SyncReport},
    records::RecordStore,
    roles::RoleSlug,
};

/// Decode `resource,action` strings, dropping malformed entries with a warning
pub fn decode_permission_list<S: AsRef<str>>(values: &[S]) -> BTreeSet<Permission> {
    values
        .iter()
        .filter_map(|value| {
            let value = value.as_ref();
            let decoded = Permission::decode(value);
            if decoded.is_none() {
                tracing::warn!(value, "Dropping malformed permission");
            }
            decoded
        })
        .collect()
}

pub fn encode_permissions(permissions: &BTreeSet<Permission>) -> Vec<String> {
    permissions.iter().map(Permission::encode).collect()
}

/// Entry point for the admin API handlers
#[derive(Clone)]
pub struct AdminService {
    enforcer: RbacEnforcer,
    records: Arc<dyn RecordStore>,
    permissions: PermissionReconciler,
    roles: RoleAssignmentReconciler,
    menus: MenuVisibilityResolver,
}

impl AdminService {
    pub fn new(enforcer: RbacEnforcer, records: Arc<dyn RecordStore>, config: &RbacConfig) -> Self {
        Self {
            permissions: PermissionReconciler::new(enforcer.clone()),
            roles: RoleAssignmentReconciler::new(enforcer.clone()),
            menus: MenuVisibilityResolver::new(enforcer.clone(), config.super_admin_menus),
            enforcer,
            records,
        }
    }

    pub fn enforcer(&self) -> &RbacEnforcer {
        &self.enforcer
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    async fn require_role(&self, role: &RoleSlug) -> RbacResult<Role> {
        self.records
            .role_by_slug(role)
            .await?
            .ok_or_else(|| RbacError::RoleNotFound {
                role: role.to_string(),
            })
    }

    async fn require_user(&self, user: UserId) -> RbacResult<()> {
        if self.records.user_exists(user).await? {
            Ok(())
        } else {
            Err(RbacError::UserNotFound { user_id: user })
        }
    }

    /// Replace a role's grants with the encoded list
    pub async fn update_role_permissions<S: AsRef<str>>(
        &self,
        role: &RoleSlug,
        permissions: &[S],
    ) -> RbacResult<SyncReport> {
        let role = self.require_role(role).await?;
        let desired = decode_permission_list(permissions);

        self.permissions
            .sync_permissions(&role.subject(), &desired)
            .await
    }

    /// Replace a user's roles. Every named role must exist.
    pub async fn update_user_roles<S: AsRef<str>>(&self, user: UserId, roles: &[S]) -> RbacResult<SyncReport> {
        self.require_user(user).await?;

        let mut desired = BTreeSet::new();
        for value in roles {
            let value: &str = value.as_ref();
            let slug = RoleSlug::new(value)?;
            self.require_role(&slug).await?;
            desired.insert(slug);
        }

        self.roles.sync_roles(user, &desired).await
    }

    /// Effective permissions of a user, encoded
    pub async fn get_user_permissions(&self, user: UserId) -> RbacResult<Vec<String>> {
        self.require_user(user).await?;
        let permissions = self.enforcer.implicit_permissions(&Subject::User(user)).await?;
        Ok(encode_permissions(&permissions))
    }

    /// Direct permissions of a role, encoded
    pub async fn get_role_permissions(&self, role: &RoleSlug) -> RbacResult<Vec<String>> {
        let role = self.require_role(role).await?;
        let permissions = self.enforcer.permissions_for(&role.subject()).await?;
        Ok(encode_permissions(&permissions))
    }

    pub async fn get_user_roles(&self, user: UserId) -> RbacResult<Vec<String>> {
        self.require_user(user).await?;
        Ok(self.enforcer.roles_for_user(user).await?.into_iter().collect())
    }

    /// Remove a role's policy tuples, then its record
    pub async fn delete_role(&self, id: i64) -> RbacResult<RoleRemoval> {
        let role = self
            .records
            .role_by_id(id)
            .await?
            .ok_or_else(|| RbacError::RoleNotFound { role: id.to_string() })?;

        let removal = self.enforcer.delete_role(&role.slug).await?;
        self.records.delete_role(id).await?;
        Ok(removal)
    }

    /// Remove a user's memberships and direct grants, then its record
    pub async fn delete_user(&self, user: UserId) -> RbacResult<RoleRemoval> {
        self.require_user(user).await?;

        let removal = self.enforcer.delete_user(user).await?;
        self.records.delete_user(user).await?;
        Ok(removal)
    }

    /// Menus the user may see
    pub async fn user_menus(&self, user: UserId) -> RbacResult<Vec<MenuNode>> {
        let menus = self.records.list_menus().await?;
        self.menus.visible_menus(&Subject::User(user), &menus).await
    }

    /// Every menu, for menu administration
    pub async fn all_menus(&self) -> RbacResult<Vec<MenuNode>> {
        self.records.list_menus().await
    }
}
