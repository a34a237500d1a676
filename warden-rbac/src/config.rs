//! Configuration for RBAC system

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::{
    error::{RbacError, RbacResult},
    menu::SuperAdminMenuPolicy,
    models::{ApiRoute, MenuNode, Permission, UserId},
    roles::RoleSlug,
};

/// RBAC configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbacConfig {
    /// User that bypasses every authorization check
    pub super_admin_user_id: UserId,

    /// Role seeded with every declared menu and API route
    pub admin_role: RoleSlug,

    /// Which menus the super admin sees
    pub super_admin_menus: SuperAdminMenuPolicy,

    /// Records and grants written into an empty policy store. A declared
    /// block replaces the console defaults as a whole.
    #[serde(default = "SeedConfig::console")]
    pub seed: SeedConfig,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            super_admin_user_id: 1,
            admin_role: RoleSlug::from_policy_key("admin"),
            super_admin_menus: SuperAdminMenuPolicy::default(),
            seed: SeedConfig::console(),
        }
    }
}

impl RbacConfig {
    /// Parse from YAML and validate
    pub fn from_yaml_str(yaml: &str) -> RbacResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file and validate
    pub fn from_file(path: impl AsRef<Path>) -> RbacResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> RbacResult<()> {
        if self.super_admin_user_id == 0 {
            return Err(RbacError::invalid_config("super_admin_user_id must be non-zero"));
        }
        self.seed.validate(&self.admin_role)
    }
}

/// Initial records and grants. Fields left out of a declared block are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub users: Vec<UserId>,
    pub menus: Vec<MenuNode>,
    pub apis: Vec<ApiRoute>,
    pub roles: Vec<RoleDefinition>,
}

impl SeedConfig {
    /// Users, menus, routes and roles of the stock admin console
    pub fn console() -> Self {
        Self {
            users: vec![1, 2, 3],
            menus: default_menus(),
            apis: default_apis(),
            roles: vec![
                RoleDefinition {
                    id: 1,
                    slug: RoleSlug::from_policy_key("admin"),
                    display_name: "Administrator".to_string(),
                    permissions: Vec::new(),
                    members: Vec::new(),
                },
                RoleDefinition {
                    id: 2,
                    slug: RoleSlug::from_policy_key("operator"),
                    display_name: "Operator".to_string(),
                    permissions: vec![
                        "menu:/dashboard,read".to_string(),
                        "menu:/dashboard/analysis,read".to_string(),
                        "menu:/dashboard/workplace,read".to_string(),
                        "menu:/account,read".to_string(),
                        "menu:/account/settings,read".to_string(),
                        "api:/v1/menus,GET".to_string(),
                    ],
                    members: vec![2],
                },
                RoleDefinition {
                    id: 3,
                    slug: RoleSlug::from_policy_key("guest"),
                    display_name: "Guest".to_string(),
                    permissions: Vec::new(),
                    members: Vec::new(),
                },
            ],
        }
    }

    /// Check slugs, ids, permission encodings and menu path uniqueness
    pub fn validate(&self, admin_role: &RoleSlug) -> RbacResult<()> {
        let mut ids = HashSet::new();
        let mut slugs = HashSet::new();

        for role in &self.roles {
            // slugs deserialized through serde are validated already; defaults are not
            crate::roles::validate_role_slug(role.slug.as_str())?;

            if !ids.insert(role.id) {
                return Err(RbacError::invalid_config(format!("Duplicate role id {}", role.id)));
            }
            if !slugs.insert(role.slug.as_str()) {
                return Err(RbacError::invalid_config(format!(
                    "Duplicate role slug '{}'",
                    role.slug
                )));
            }

            role.decoded_permissions()?;

            if let Some(member) = role.members.iter().find(|m| !self.users.contains(m)) {
                return Err(RbacError::invalid_config(format!(
                    "Role '{}' lists unknown member {}",
                    role.slug, member
                )));
            }
        }

        crate::roles::validate_role_slug(admin_role.as_str())?;

        let mut paths = HashSet::new();
        for menu in &self.menus {
            if menu.path.is_empty() {
                return Err(RbacError::invalid_config(format!("Menu {} has an empty path", menu.id)));
            }
            if !paths.insert(menu.path.as_str()) {
                return Err(RbacError::invalid_config(format!(
                    "Duplicate menu path '{}'",
                    menu.path
                )));
            }
        }

        for api in &self.apis {
            if api.path.is_empty() || api.method.is_empty() {
                return Err(RbacError::invalid_config(format!(
                    "API route '{}' needs a path and a method",
                    api.name
                )));
            }
        }

        Ok(())
    }
}

/// Role definition in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub id: i64,
    pub slug: RoleSlug,
    pub display_name: String,
    /// Grants in `resource,action` form
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Users assigned this role on seeding
    #[serde(default)]
    pub members: Vec<UserId>,
}

impl RoleDefinition {
    pub fn decoded_permissions(&self) -> RbacResult<Vec<Permission>> {
        self.permissions
            .iter()
            .map(|value| {
                Permission::decode(value).ok_or_else(|| RbacError::InvalidPermission {
                    value: value.clone(),
                })
            })
            .collect()
    }
}

fn menu(id: i64, parent_id: i64, path: &str, title: &str, weight: i32) -> MenuNode {
    MenuNode::new(id, parent_id, path, title).with_weight(weight)
}

fn default_menus() -> Vec<MenuNode> {
    let mut dashboard = menu(1, 0, "/dashboard", "Dashboard", 10);
    dashboard.component = Some("RouteView".to_string());
    dashboard.redirect = Some("/dashboard/analysis".to_string());
    dashboard.icon = Some("DashboardOutlined".to_string());

    let mut analysis = menu(2, 1, "/dashboard/analysis", "Analysis", 2);
    analysis.keep_alive = true;

    let mut access = menu(15, 0, "/access", "Access Control", 1);
    access.component = Some("RouteView".to_string());
    access.icon = Some("ClusterOutlined".to_string());

    vec![
        dashboard,
        analysis,
        menu(3, 1, "/dashboard/workplace", "Workplace", 1),
        menu(4, 0, "/account", "Account", 5),
        menu(5, 4, "/account/settings", "Settings", 0),
        menu(6, 4, "/account/center", "Profile", 0),
        access,
        menu(16, 15, "/access/role", "Roles", 0),
        menu(17, 15, "/access/menu", "Menus", 0),
        menu(18, 15, "/access/admin", "Administrators", 0),
    ]
}

fn default_apis() -> Vec<ApiRoute> {
    vec![
        ApiRoute::new("basic", "User menus", "/v1/menus", "GET"),
        ApiRoute::new("menus", "All menus", "/v1/admin/menus", "GET"),
        ApiRoute::new("access", "User permissions", "/v1/admin/user/permissions", "GET"),
        ApiRoute::new("access", "User roles", "/v1/admin/user/roles", "GET"),
        ApiRoute::new("access", "Update user roles", "/v1/admin/user/roles", "PUT"),
        ApiRoute::new("access", "Delete administrator", "/v1/admin/user", "DELETE"),
        ApiRoute::new("access", "Role permissions", "/v1/admin/role/permissions", "GET"),
        ApiRoute::new("access", "Update role permissions", "/v1/admin/role/permission", "PUT"),
        ApiRoute::new("access", "Delete role", "/v1/admin/role", "DELETE"),
    ]
}
