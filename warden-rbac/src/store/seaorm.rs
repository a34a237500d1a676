//! SeaORM-backed policy store
//!
//! Tuples are kept in a single `policy_rules` table using the Casbin row
//! shape: `ptype = "p"` rows are grants (`v0, v1, v2 = subject, resource,
//! action`) and `ptype = "g"` rows are memberships (`v0, v1 = user, role`,
//! `v2` empty). Seed scripts and the console UI read this table directly.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Index, ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Schema, Set,
    TransactionTrait,
};

use super::PolicyStore;
use crate::{
    error::RbacResult,
    models::{GrantTuple, Permission},
};

use entity::{ActiveModel, Column, Entity as PolicyRules};

const GRANT_PTYPE: &str = "p";
const MEMBERSHIP_PTYPE: &str = "g";

pub mod entity {
    //! `policy_rules` table

    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "policy_rules")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub ptype: String,
        pub v0: String,
        pub v1: String,
        pub v2: String,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Policy store persisted through SeaORM
#[derive(Clone)]
pub struct SeaOrmPolicyStore {
    db: DatabaseConnection,
}

impl SeaOrmPolicyStore {
    /// Wrap an existing connection. The schema must already exist.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect and make sure the schema exists
    pub async fn connect(url: &str, max_connections: u32) -> RbacResult<Self> {
        let mut options = ConnectOptions::new(url.to_string());
        options.max_connections(max_connections).sqlx_logging(false);

        let db = Database::connect(options).await?;
        let store = Self::new(db);
        store.ensure_schema().await?;

        tracing::info!(url = %redact_url(url), "Connected policy store");
        Ok(store)
    }

    /// Create the `policy_rules` table and its uniqueness index if missing
    pub async fn ensure_schema(&self) -> RbacResult<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut table = schema.create_table_from_entity(PolicyRules);
        table.if_not_exists();
        self.db.execute(backend.build(&table)).await?;

        let index = Index::create()
            .name("idx_policy_rules_tuple")
            .table(PolicyRules)
            .col(Column::Ptype)
            .col(Column::V0)
            .col(Column::V1)
            .col(Column::V2)
            .unique()
            .if_not_exists()
            .to_owned();
        self.db.execute(backend.build(&index)).await?;

        Ok(())
    }

    async fn delete_rules(
        &self,
        ptype: &str,
        v0: Option<&str>,
        v1: Option<&str>,
        v2: Option<&str>,
    ) -> RbacResult<u64> {
        let mut query = PolicyRules::delete_many().filter(Column::Ptype.eq(ptype));

        if let Some(v0) = v0 {
            query = query.filter(Column::V0.eq(v0));
        }
        if let Some(v1) = v1 {
            query = query.filter(Column::V1.eq(v1));
        }
        if let Some(v2) = v2 {
            query = query.filter(Column::V2.eq(v2));
        }

        let result = query.exec(&self.db).await?;
        Ok(result.rows_affected)
    }
}

/// Insert one rule unless it already exists
async fn insert_rule<C>(conn: &C, ptype: &str, v0: &str, v1: &str, v2: &str) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let existing = PolicyRules::find()
        .filter(Column::Ptype.eq(ptype))
        .filter(Column::V0.eq(v0))
        .filter(Column::V1.eq(v1))
        .filter(Column::V2.eq(v2))
        .one(conn)
        .await?;

    if existing.is_some() {
        return Ok(false);
    }

    let rule = ActiveModel {
        ptype: Set(ptype.to_string()),
        v0: Set(v0.to_string()),
        v1: Set(v1.to_string()),
        v2: Set(v2.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    rule.insert(conn).await?;

    Ok(true)
}

fn redact_url(url: &str) -> String {
    match url.split_once('@') {
        Some((_, host)) => format!("***@{}", host),
        None => url.to_string(),
    }
}

#[async_trait]
impl PolicyStore for SeaOrmPolicyStore {
    async fn grants_for(&self, subject: &str) -> RbacResult<Vec<Permission>> {
        let rules = PolicyRules::find()
            .filter(Column::Ptype.eq(GRANT_PTYPE))
            .filter(Column::V0.eq(subject))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;

        Ok(rules
            .into_iter()
            .map(|rule| Permission::new(rule.v1, rule.v2))
            .collect())
    }

    async fn all_grants(&self) -> RbacResult<Vec<GrantTuple>> {
        let rules = PolicyRules::find()
            .filter(Column::Ptype.eq(GRANT_PTYPE))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;

        Ok(rules
            .into_iter()
            .map(|rule| GrantTuple {
                subject: rule.v0,
                resource: rule.v1,
                action: rule.v2,
            })
            .collect())
    }

    async fn add_grants(&self, subject: &str, permissions: &[Permission]) -> RbacResult<usize> {
        let txn = self.db.begin().await?;
        let mut inserted = 0;

        for perm in permissions {
            if insert_rule(&txn, GRANT_PTYPE, subject, &perm.resource, &perm.action).await? {
                inserted += 1;
            }
        }

        txn.commit().await?;
        Ok(inserted)
    }

    async fn remove_grant(&self, subject: &str, permission: &Permission) -> RbacResult<bool> {
        let removed = self
            .delete_rules(
                GRANT_PTYPE,
                Some(subject),
                Some(&permission.resource),
                Some(&permission.action),
            )
            .await?;
        Ok(removed > 0)
    }

    async fn remove_subject_grants(&self, subject: &str) -> RbacResult<usize> {
        let removed = self
            .delete_rules(GRANT_PTYPE, Some(subject), None, None)
            .await?;
        Ok(removed as usize)
    }

    async fn roles_for(&self, user: &str) -> RbacResult<Vec<String>> {
        let rules = PolicyRules::find()
            .filter(Column::Ptype.eq(MEMBERSHIP_PTYPE))
            .filter(Column::V0.eq(user))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;

        Ok(rules.into_iter().map(|rule| rule.v1).collect())
    }

    async fn users_for_role(&self, role: &str) -> RbacResult<Vec<String>> {
        let rules = PolicyRules::find()
            .filter(Column::Ptype.eq(MEMBERSHIP_PTYPE))
            .filter(Column::V1.eq(role))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;

        Ok(rules.into_iter().map(|rule| rule.v0).collect())
    }

    async fn add_memberships(&self, user: &str, roles: &[String]) -> RbacResult<usize> {
        let txn = self.db.begin().await?;
        let mut inserted = 0;

        for role in roles {
            if insert_rule(&txn, MEMBERSHIP_PTYPE, user, role, "").await? {
                inserted += 1;
            }
        }

        txn.commit().await?;
        Ok(inserted)
    }

    async fn remove_membership(&self, user: &str, role: &str) -> RbacResult<bool> {
        let removed = self
            .delete_rules(MEMBERSHIP_PTYPE, Some(user), Some(role), None)
            .await?;
        Ok(removed > 0)
    }

    async fn remove_user_memberships(&self, user: &str) -> RbacResult<usize> {
        let removed = self
            .delete_rules(MEMBERSHIP_PTYPE, Some(user), None, None)
            .await?;
        Ok(removed as usize)
    }

    async fn remove_role_memberships(&self, role: &str) -> RbacResult<usize> {
        let removed = self
            .delete_rules(MEMBERSHIP_PTYPE, None, Some(role), None)
            .await?;
        Ok(removed as usize)
    }

    async fn is_empty(&self) -> RbacResult<bool> {
        let count = PolicyRules::find().count(&self.db).await?;
        Ok(count == 0)
    }
}
