//! Menu visibility

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{
    enforcer::RbacEnforcer,
    error::RbacResult,
    models::{MenuNode, Subject},
};

/// What the super admin sees in the console menu
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuperAdminMenuPolicy {
    /// Every menu that some role has been granted
    #[default]
    AuthoredGrants,
    /// Every menu node, granted or not
    AllowAll,
}

/// Filters a menu list down to what a subject may see.
///
/// A node is visible when the subject holds `(menu:<path>, read)`. Parents of
/// a visible node are not added implicitly.
#[derive(Clone)]
pub struct MenuVisibilityResolver {
    enforcer: RbacEnforcer,
    super_admin_policy: SuperAdminMenuPolicy,
}

impl MenuVisibilityResolver {
    pub fn new(enforcer: RbacEnforcer, super_admin_policy: SuperAdminMenuPolicy) -> Self {
        Self {
            enforcer,
            super_admin_policy,
        }
    }

    /// Menu paths the subject may read; `None` means every path
    pub async fn visible_paths(&self, subject: &Subject) -> RbacResult<Option<BTreeSet<String>>> {
        if self.enforcer.is_super_admin(subject) {
            return match self.super_admin_policy {
                SuperAdminMenuPolicy::AllowAll => Ok(None),
                SuperAdminMenuPolicy::AuthoredGrants => {
                    Ok(Some(self.enforcer.authored_menu_paths().await?))
                }
            };
        }

        let permissions = self.enforcer.implicit_permissions(subject).await?;
        Ok(Some(
            permissions
                .iter()
                .filter_map(|p| p.readable_menu_path().map(str::to_string))
                .collect(),
        ))
    }

    /// Visible nodes ordered by weight, heaviest first
    pub async fn visible_menus(&self, subject: &Subject, menus: &[MenuNode]) -> RbacResult<Vec<MenuNode>> {
        let paths = self.visible_paths(subject).await?;

        let mut visible: Vec<MenuNode> = menus
            .iter()
            .filter(|node| paths.as_ref().map_or(true, |p| p.contains(&node.path)))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.weight.cmp(&a.weight));

        tracing::debug!(%subject, total = menus.len(), visible = visible.len(), "Resolved visible menus");
        Ok(visible)
    }
}
