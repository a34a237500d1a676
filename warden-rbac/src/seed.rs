//! First-run seeding of the policy store

use crate::{
    config::RbacConfig,
    enforcer::RbacEnforcer,
    error::RbacResult,
    models::{Permission, Subject},
    records::RecordStore,
};

/// Tuples written by [`seed_if_empty`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// The store already held tuples and nothing was written
    pub skipped: bool,
    pub grants: usize,
    pub memberships: usize,
}

/// Seed an empty policy store.
///
/// The super admin joins the admin role, which is granted read on every menu
/// and every declared API route. Each configured role then receives its
/// listed permissions and members. A store holding any tuple is left alone.
pub async fn seed_if_empty(
    enforcer: &RbacEnforcer,
    records: &dyn RecordStore,
    config: &RbacConfig,
) -> RbacResult<SeedReport> {
    let menus = records.list_menus().await?;
    let apis = records.list_apis().await?;

    let store = enforcer.write_store().await;
    if !store.is_empty().await? {
        tracing::debug!("Policy store already populated, skipping seed");
        return Ok(SeedReport {
            skipped: true,
            ..Default::default()
        });
    }

    let mut report = SeedReport::default();
    let admin = config.admin_role.as_str().to_string();

    report.memberships += store
        .add_memberships(
            &Subject::User(config.super_admin_user_id).policy_key(),
            std::slice::from_ref(&admin),
        )
        .await?;

    let admin_grants: Vec<Permission> = menus
        .iter()
        .map(|menu| Permission::menu_read(&menu.path))
        .chain(apis.iter().map(|api| api.permission()))
        .collect();
    report.grants += store.add_grants(&admin, &admin_grants).await?;

    for role in &config.seed.roles {
        let permissions = role.decoded_permissions()?;
        if !permissions.is_empty() {
            report.grants += store.add_grants(role.slug.as_str(), &permissions).await?;
        }

        for member in &role.members {
            report.memberships += store
                .add_memberships(
                    &Subject::User(*member).policy_key(),
                    &[role.slug.as_str().to_string()],
                )
                .await?;
        }
    }

    tracing::info!(
        grants = report.grants,
        memberships = report.memberships,
        "Seeded policy store"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MemoryRecordStore;
    use crate::store::MemoryPolicyStore;

    #[tokio::test]
    async fn test_seed_runs_once() {
        let config = RbacConfig::default();
        let records = MemoryRecordStore::from_seed(&config.seed, &config.admin_role);
        let enforcer = RbacEnforcer::new(MemoryPolicyStore::new(), config.super_admin_user_id);

        let report = seed_if_empty(&enforcer, &records, &config).await.unwrap();
        assert!(!report.skipped);
        assert_eq!(
            report.grants,
            config.seed.menus.len() + config.seed.apis.len() + 6
        );
        assert_eq!(report.memberships, 2);

        let again = seed_if_empty(&enforcer, &records, &config).await.unwrap();
        assert!(again.skipped);
        assert_eq!(again.grants, 0);
    }

    #[tokio::test]
    async fn test_seeded_operator_can_read_menus() {
        let config = RbacConfig::default();
        let records = MemoryRecordStore::from_seed(&config.seed, &config.admin_role);
        let enforcer = RbacEnforcer::new(MemoryPolicyStore::new(), config.super_admin_user_id);
        seed_if_empty(&enforcer, &records, &config).await.unwrap();

        let operator = Subject::User(2);
        assert!(enforcer.enforce(&operator, "api:/v1/menus", "GET").await.unwrap());
        assert!(!enforcer
            .enforce(&operator, "api:/v1/admin/role", "DELETE")
            .await
            .unwrap());
        assert!(enforcer
            .roles_for_user(1)
            .await
            .unwrap()
            .contains("admin"));
    }
}
