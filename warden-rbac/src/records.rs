//! Entity records the policy engine consults but does not own

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use crate::{
    config::SeedConfig,
    error::RbacResult,
    models::{ApiRoute, MenuNode, Role, UserId},
    roles::RoleSlug,
};

/// Read access to users, roles, menus and API routes
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All menu nodes, heaviest weight first
    async fn list_menus(&self) -> RbacResult<Vec<MenuNode>>;

    async fn list_apis(&self) -> RbacResult<Vec<ApiRoute>>;

    async fn role_by_slug(&self, slug: &RoleSlug) -> RbacResult<Option<Role>>;

    async fn role_by_id(&self, id: i64) -> RbacResult<Option<Role>>;

    /// Delete a role record. Returns whether it existed.
    async fn delete_role(&self, id: i64) -> RbacResult<bool>;

    async fn user_exists(&self, user: UserId) -> RbacResult<bool>;

    /// Delete a user record. Returns whether it existed.
    async fn delete_user(&self, user: UserId) -> RbacResult<bool>;
}

#[derive(Debug, Default)]
struct Records {
    users: BTreeSet<UserId>,
    roles: BTreeMap<i64, Role>,
    menus: Vec<MenuNode>,
    apis: Vec<ApiRoute>,
}

/// Record store held in memory, built from the seed configuration
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<Records>,
}

impl MemoryRecordStore {
    pub fn new(
        users: impl IntoIterator<Item = UserId>,
        roles: impl IntoIterator<Item = Role>,
        mut menus: Vec<MenuNode>,
        apis: Vec<ApiRoute>,
    ) -> Self {
        menus.sort_by(|a, b| b.weight.cmp(&a.weight));

        Self {
            records: RwLock::new(Records {
                users: users.into_iter().collect(),
                roles: roles.into_iter().map(|r| (r.id, r)).collect(),
                menus,
                apis,
            }),
        }
    }

    /// Build records from seed configuration. The admin role gets id 0 when
    /// the configuration does not declare it.
    pub fn from_seed(seed: &SeedConfig, admin_role: &RoleSlug) -> Self {
        let mut roles: Vec<Role> = seed
            .roles
            .iter()
            .map(|def| Role::new(def.id, def.slug.clone(), def.display_name.clone()))
            .collect();

        if !roles.iter().any(|r| &r.slug == admin_role) {
            roles.push(Role::new(0, admin_role.clone(), "Administrator"));
        }

        Self::new(
            seed.users.iter().copied(),
            roles,
            seed.menus.clone(),
            seed.apis.clone(),
        )
    }

    pub async fn add_user(&self, user: UserId) {
        self.records.write().await.users.insert(user);
    }

    pub async fn add_role(&self, role: Role) {
        self.records.write().await.roles.insert(role.id, role);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_menus(&self) -> RbacResult<Vec<MenuNode>> {
        Ok(self.records.read().await.menus.clone())
    }

    async fn list_apis(&self) -> RbacResult<Vec<ApiRoute>> {
        Ok(self.records.read().await.apis.clone())
    }

    async fn role_by_slug(&self, slug: &RoleSlug) -> RbacResult<Option<Role>> {
        let records = self.records.read().await;
        Ok(records.roles.values().find(|r| &r.slug == slug).cloned())
    }

    async fn role_by_id(&self, id: i64) -> RbacResult<Option<Role>> {
        Ok(self.records.read().await.roles.get(&id).cloned())
    }

    async fn delete_role(&self, id: i64) -> RbacResult<bool> {
        Ok(self.records.write().await.roles.remove(&id).is_some())
    }

    async fn user_exists(&self, user: UserId) -> RbacResult<bool> {
        Ok(self.records.read().await.users.contains(&user))
    }

    async fn delete_user(&self, user: UserId) -> RbacResult<bool> {
        Ok(self.records.write().await.users.remove(&user))
    }
}
