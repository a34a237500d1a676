//! Minimal-diff reconciliation of grants and memberships
//!
//! Both reconcilers hold the enforcer's write lock for the whole run, so two
//! syncs never interleave and no decision observes a half-applied diff.
//! Removals go first, one tuple at a time; additions follow as one batch.
//! Nothing is rolled back on failure. Re-running the same sync converges.

use std::collections::BTreeSet;

use crate::{
    enforcer::RbacEnforcer,
    error::{RbacError, RbacResult},
    models::{Permission, Subject, UserId},
    roles::RoleSlug,
};

/// Difference between the current and desired state of one subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan<T> {
    pub to_remove: Vec<T>,
    pub to_add: Vec<T>,
}

impl<T: Ord + Clone> SyncPlan<T> {
    pub fn diff(current: &BTreeSet<T>, desired: &BTreeSet<T>) -> Self {
        Self {
            to_remove: current.difference(desired).cloned().collect(),
            to_add: desired.difference(current).cloned().collect(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Writes performed by one sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Tracks applied writes so an abort can name what is still pending
struct SyncProgress {
    subject: String,
    applied: usize,
}

impl SyncProgress {
    fn new(subject: &Subject) -> Self {
        Self {
            subject: subject.to_string(),
            applied: 0,
        }
    }

    /// Every failed write is reported with the tuple that failed, including
    /// a failure on the very first write.
    fn abort(self, failed: String, pending: Vec<String>, source: RbacError) -> RbacError {
        tracing::warn!(
            subject = %self.subject,
            failed = %failed,
            applied = self.applied,
            pending = pending.len(),
            error = %source,
            "Sync aborted part way"
        );

        RbacError::PartialSync {
            subject: self.subject,
            failed,
            applied: self.applied,
            pending,
            source: Box::new(source),
        }
    }
}

fn pending_ops<'a>(
    removals: impl Iterator<Item = &'a str>,
    additions: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    removals
        .map(|r| format!("-{}", r))
        .chain(additions.map(|a| format!("+{}", a)))
        .collect()
}

/// Converges a subject's direct grants onto a desired set
#[derive(Clone)]
pub struct PermissionReconciler {
    enforcer: RbacEnforcer,
}

impl PermissionReconciler {
    pub fn new(enforcer: RbacEnforcer) -> Self {
        Self { enforcer }
    }

    /// Sync a subject's direct grants. An empty desired set removes them all.
    pub async fn sync_permissions(
        &self,
        subject: &Subject,
        desired: &BTreeSet<Permission>,
    ) -> RbacResult<SyncReport> {
        let store = self.enforcer.write_store().await;
        let key = subject.policy_key();

        let current: BTreeSet<Permission> = store.grants_for(&key).await?.into_iter().collect();
        let plan = SyncPlan::diff(&current, desired);

        if plan.is_noop() {
            tracing::debug!(%subject, "Permissions already in sync");
            return Ok(SyncReport::default());
        }

        let encoded_removals: Vec<String> = plan.to_remove.iter().map(Permission::encode).collect();
        let encoded_additions: Vec<String> = plan.to_add.iter().map(Permission::encode).collect();

        let mut progress = SyncProgress::new(subject);
        for (i, perm) in plan.to_remove.iter().enumerate() {
            if let Err(e) = store.remove_grant(&key, perm).await {
                let pending = pending_ops(
                    encoded_removals[i + 1..].iter().map(String::as_str),
                    encoded_additions.iter().map(String::as_str),
                );
                return Err(progress.abort(format!("-{}", encoded_removals[i]), pending, e));
            }
            progress.applied += 1;
        }

        let mut report = SyncReport {
            added: 0,
            removed: progress.applied,
        };

        if !plan.to_add.is_empty() {
            match store.add_grants(&key, &plan.to_add).await {
                Ok(inserted) => report.added = inserted,
                Err(e) => {
                    let pending = pending_ops(
                        std::iter::empty::<&str>(),
                        encoded_additions.iter().map(String::as_str),
                    );
                    let failed = format!("+{} grants", plan.to_add.len());
                    return Err(progress.abort(failed, pending, e));
                }
            }
        }

        tracing::info!(%subject, added = report.added, removed = report.removed, "Synced permissions");
        Ok(report)
    }
}

/// Converges a user's role memberships onto a desired set
#[derive(Clone)]
pub struct RoleAssignmentReconciler {
    enforcer: RbacEnforcer,
}

impl RoleAssignmentReconciler {
    pub fn new(enforcer: RbacEnforcer) -> Self {
        Self { enforcer }
    }

    /// Sync a user's memberships. An empty desired set drops every membership
    /// in one call.
    pub async fn sync_roles(&self, user: UserId, desired: &BTreeSet<RoleSlug>) -> RbacResult<SyncReport> {
        let subject = Subject::User(user);
        let key = subject.policy_key();
        let store = self.enforcer.write_store().await;

        if desired.is_empty() {
            let removed = store.remove_user_memberships(&key).await?;
            tracing::info!(%subject, removed, "Removed all role memberships");
            return Ok(SyncReport { added: 0, removed });
        }

        let current: BTreeSet<String> = store.roles_for(&key).await?.into_iter().collect();
        let desired: BTreeSet<String> = desired.iter().map(|r| r.as_str().to_string()).collect();
        let plan = SyncPlan::diff(&current, &desired);

        if plan.is_noop() {
            tracing::debug!(%subject, "Roles already in sync");
            return Ok(SyncReport::default());
        }

        let mut progress = SyncProgress::new(&subject);
        for (i, role) in plan.to_remove.iter().enumerate() {
            if let Err(e) = store.remove_membership(&key, role).await {
                let pending = pending_ops(
                    plan.to_remove[i + 1..].iter().map(String::as_str),
                    plan.to_add.iter().map(String::as_str),
                );
                return Err(progress.abort(format!("-{}", role), pending, e));
            }
            progress.applied += 1;
        }

        let mut report = SyncReport {
            added: 0,
            removed: progress.applied,
        };

        if !plan.to_add.is_empty() {
            match store.add_memberships(&key, &plan.to_add).await {
                Ok(inserted) => report.added = inserted,
                Err(e) => {
                    let pending = pending_ops(std::iter::empty::<&str>(), plan.to_add.iter().map(String::as_str));
                    let failed = format!("+{} memberships", plan.to_add.len());
                    return Err(progress.abort(failed, pending, e));
                }
            }
        }

        tracing::info!(%subject, added = report.added, removed = report.removed, "Synced roles");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::FaultyStore;
    use crate::store::MemoryPolicyStore;
    use std::sync::atomic::Ordering;

    fn slug(s: &str) -> RoleSlug {
        RoleSlug::new(s).unwrap()
    }

    fn perms(list: &[(&str, &str)]) -> BTreeSet<Permission> {
        list.iter().map(|(r, a)| Permission::new(*r, *a)).collect()
    }

    #[test]
    fn test_plan_diff() {
        let current: BTreeSet<i32> = [1, 2].into_iter().collect();
        let desired: BTreeSet<i32> = [2, 3].into_iter().collect();
        let plan = SyncPlan::diff(&current, &desired);

        assert_eq!(plan.to_remove, vec![1]);
        assert_eq!(plan.to_add, vec![3]);
        assert!(SyncPlan::diff(&desired, &desired).is_noop());
    }

    #[tokio::test]
    async fn test_second_sync_writes_nothing() {
        let (store, faults) = FaultyStore::new();
        let reconciler = PermissionReconciler::new(RbacEnforcer::new(store, 1));
        let subject = Subject::Role(slug("editor"));
        let desired = perms(&[("api:/docs", "GET"), ("menu:/docs", "read")]);

        let first = reconciler.sync_permissions(&subject, &desired).await.unwrap();
        assert_eq!(first, SyncReport { added: 2, removed: 0 });
        let writes = faults.writes();

        let second = reconciler.sync_permissions(&subject, &desired).await.unwrap();
        assert!(second.is_noop());
        assert_eq!(faults.writes(), writes);
    }

    #[tokio::test]
    async fn test_only_the_difference_is_written() {
        let enforcer = RbacEnforcer::new(MemoryPolicyStore::new(), 1);
        let reconciler = PermissionReconciler::new(enforcer.clone());
        let subject = Subject::Role(slug("editor"));

        reconciler
            .sync_permissions(&subject, &perms(&[("r1", "read"), ("r2", "write")]))
            .await
            .unwrap();
        let report = reconciler
            .sync_permissions(&subject, &perms(&[("r2", "write"), ("r3", "read")]))
            .await
            .unwrap();

        assert_eq!(report, SyncReport { added: 1, removed: 1 });
        assert_eq!(
            enforcer.permissions_for(&subject).await.unwrap(),
            perms(&[("r2", "write"), ("r3", "read")])
        );
    }

    #[tokio::test]
    async fn test_empty_desired_set_clears_grants() {
        let enforcer = RbacEnforcer::new(MemoryPolicyStore::new(), 1);
        let reconciler = PermissionReconciler::new(enforcer.clone());
        let subject = Subject::User(4);

        reconciler
            .sync_permissions(&subject, &perms(&[("api:/a", "GET"), ("api:/b", "GET")]))
            .await
            .unwrap();
        let report = reconciler
            .sync_permissions(&subject, &BTreeSet::new())
            .await
            .unwrap();

        assert_eq!(report.removed, 2);
        assert!(enforcer.permissions_for(&subject).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_removal_failure_reports_pending_work() {
        let (store, faults) = FaultyStore::new();
        let enforcer = RbacEnforcer::new(store, 1);
        let reconciler = PermissionReconciler::new(enforcer.clone());
        let subject = Subject::Role(slug("editor"));

        reconciler
            .sync_permissions(&subject, &perms(&[("a", "read"), ("b", "read"), ("c", "read")]))
            .await
            .unwrap();
        faults.fail_removal_at.store(2, Ordering::SeqCst);

        let err = reconciler
            .sync_permissions(&subject, &perms(&[("c", "read"), ("d", "read")]))
            .await
            .unwrap_err();

        match err {
            RbacError::PartialSync {
                failed,
                applied,
                pending,
                ..
            } => {
                assert_eq!(failed, "-b,read");
                assert_eq!(applied, 1);
                assert_eq!(pending, vec!["+d,read".to_string()]);
            }
            other => panic!("expected partial sync, got {:?}", other),
        }

        // removal of "a" stays applied
        assert_eq!(
            enforcer.permissions_for(&subject).await.unwrap(),
            perms(&[("b", "read"), ("c", "read")])
        );

        // rerun converges
        faults.fail_removal_at.store(0, Ordering::SeqCst);
        reconciler
            .sync_permissions(&subject, &perms(&[("c", "read"), ("d", "read")]))
            .await
            .unwrap();
        assert_eq!(
            enforcer.permissions_for(&subject).await.unwrap(),
            perms(&[("c", "read"), ("d", "read")])
        );
    }

    fn expect_partial(err: RbacError) -> (String, usize, Vec<String>) {
        assert!(err.is_store_unavailable());
        match err {
            RbacError::PartialSync {
                failed,
                applied,
                pending,
                ..
            } => (failed, applied, pending),
            other => panic!("expected partial sync, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_removal_failure_names_the_tuple() {
        let (store, faults) = FaultyStore::new();
        let enforcer = RbacEnforcer::new(store, 1);
        let reconciler = PermissionReconciler::new(enforcer.clone());
        let subject = Subject::Role(slug("editor"));

        reconciler
            .sync_permissions(&subject, &perms(&[("a", "read"), ("b", "read")]))
            .await
            .unwrap();
        faults.fail_removal_at.store(1, Ordering::SeqCst);

        let err = reconciler
            .sync_permissions(&subject, &perms(&[("c", "read")]))
            .await
            .unwrap_err();
        let (failed, applied, pending) = expect_partial(err);

        assert_eq!(failed, "-a,read");
        assert_eq!(applied, 0);
        assert_eq!(pending, vec!["-b,read".to_string(), "+c,read".to_string()]);
        assert_eq!(
            enforcer.permissions_for(&subject).await.unwrap(),
            perms(&[("a", "read"), ("b", "read")])
        );
    }

    #[tokio::test]
    async fn test_failed_batch_add_without_removals() {
        let (store, faults) = FaultyStore::new();
        let reconciler = PermissionReconciler::new(RbacEnforcer::new(store, 1));
        faults.fail_adds.store(true, Ordering::SeqCst);

        let err = reconciler
            .sync_permissions(&Subject::User(3), &perms(&[("a", "read")]))
            .await
            .unwrap_err();
        let (failed, applied, pending) = expect_partial(err);

        assert_eq!(failed, "+1 grants");
        assert_eq!(applied, 0);
        assert_eq!(pending, vec!["+a,read".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_batch_add_after_removals() {
        let (store, faults) = FaultyStore::new();
        let enforcer = RbacEnforcer::new(store, 1);
        let reconciler = PermissionReconciler::new(enforcer.clone());
        let subject = Subject::Role(slug("editor"));

        reconciler
            .sync_permissions(&subject, &perms(&[("a", "read"), ("b", "read")]))
            .await
            .unwrap();
        faults.fail_adds.store(true, Ordering::SeqCst);

        let err = reconciler
            .sync_permissions(&subject, &perms(&[("b", "read"), ("c", "read"), ("d", "read")]))
            .await
            .unwrap_err();
        let (failed, applied, pending) = expect_partial(err);

        assert_eq!(failed, "+2 grants");
        assert_eq!(applied, 1);
        assert_eq!(pending, vec!["+c,read".to_string(), "+d,read".to_string()]);
        assert_eq!(
            enforcer.permissions_for(&subject).await.unwrap(),
            perms(&[("b", "read")])
        );
    }

    #[tokio::test]
    async fn test_membership_removal_failure_reports_pending_work() {
        let (store, faults) = FaultyStore::new();
        let enforcer = RbacEnforcer::new(store, 1);
        let reconciler = RoleAssignmentReconciler::new(enforcer.clone());
        let initial: BTreeSet<RoleSlug> = [slug("editor"), slug("viewer")].into_iter().collect();
        reconciler.sync_roles(7, &initial).await.unwrap();
        faults.fail_removal_at.store(2, Ordering::SeqCst);

        let desired: BTreeSet<RoleSlug> = [slug("ops")].into_iter().collect();
        let err = reconciler.sync_roles(7, &desired).await.unwrap_err();
        let (failed, applied, pending) = expect_partial(err);

        assert_eq!(failed, "-viewer");
        assert_eq!(applied, 1);
        assert_eq!(pending, vec!["+ops".to_string()]);
        assert_eq!(
            enforcer.roles_for_user(7).await.unwrap().into_iter().collect::<Vec<_>>(),
            vec!["viewer".to_string()]
        );

        faults.fail_removal_at.store(0, Ordering::SeqCst);
        reconciler.sync_roles(7, &desired).await.unwrap();
        assert_eq!(
            enforcer.roles_for_user(7).await.unwrap().into_iter().collect::<Vec<_>>(),
            vec!["ops".to_string()]
        );
    }

    #[tokio::test]
    async fn test_membership_add_failure_after_removals() {
        let (store, faults) = FaultyStore::new();
        let enforcer = RbacEnforcer::new(store, 1);
        let reconciler = RoleAssignmentReconciler::new(enforcer.clone());
        let initial: BTreeSet<RoleSlug> = [slug("editor")].into_iter().collect();
        reconciler.sync_roles(7, &initial).await.unwrap();
        faults.fail_adds.store(true, Ordering::SeqCst);

        let desired: BTreeSet<RoleSlug> = [slug("viewer")].into_iter().collect();
        let err = reconciler.sync_roles(7, &desired).await.unwrap_err();
        let (failed, applied, pending) = expect_partial(err);

        assert_eq!(failed, "+1 memberships");
        assert_eq!(applied, 1);
        assert_eq!(pending, vec!["+viewer".to_string()]);
        assert!(enforcer.roles_for_user(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_roles_diff_and_clear() {
        let enforcer = RbacEnforcer::new(MemoryPolicyStore::new(), 1);
        let reconciler = RoleAssignmentReconciler::new(enforcer.clone());
        let desired: BTreeSet<RoleSlug> = [slug("editor"), slug("viewer")].into_iter().collect();

        assert_eq!(
            reconciler.sync_roles(7, &desired).await.unwrap(),
            SyncReport { added: 2, removed: 0 }
        );
        assert!(reconciler.sync_roles(7, &desired).await.unwrap().is_noop());

        let narrowed: BTreeSet<RoleSlug> = [slug("viewer"), slug("ops")].into_iter().collect();
        assert_eq!(
            reconciler.sync_roles(7, &narrowed).await.unwrap(),
            SyncReport { added: 1, removed: 1 }
        );
        assert_eq!(
            enforcer.roles_for_user(7).await.unwrap().into_iter().collect::<Vec<_>>(),
            vec!["ops".to_string(), "viewer".to_string()]
        );

        let cleared = reconciler.sync_roles(7, &BTreeSet::new()).await.unwrap();
        assert_eq!(cleared.removed, 2);
        assert!(enforcer.roles_for_user(7).await.unwrap().is_empty());
    }
}
