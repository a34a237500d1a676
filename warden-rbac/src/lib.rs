//! Role-based access control for the Warden admin console
//!
//! This crate provides the policy engine behind the console:
//! - Grant and membership storage with in-memory and SeaORM backends
//! - Fail-closed enforcement with a super-admin bypass
//! - Minimal-diff reconciliation of role permissions and user roles
//! - Menu visibility and axum middleware guarding API routes

pub mod admin;
pub mod auth;
pub mod config;
pub mod enforcer;
pub mod error;
pub mod menu;
pub mod middleware;
pub mod models;
pub mod reconcile;
pub mod records;
pub mod roles;
pub mod seed;
pub mod store;

pub use admin::AdminService;
pub use auth::{AuthContext, CredentialVerifier, HeaderCredentialVerifier};
pub use config::{RbacConfig, RoleDefinition, SeedConfig};
pub use enforcer::{RbacEnforcer, RoleRemoval};
pub use error::{RbacError, RbacResult};
pub use menu::{MenuVisibilityResolver, SuperAdminMenuPolicy};
pub use middleware::RbacMiddleware;
pub use models::{ApiRoute, MenuNode, Permission, Resource, Role, Subject, UserId};
pub use reconcile::{PermissionReconciler, RoleAssignmentReconciler, SyncReport};
pub use records::{MemoryRecordStore, RecordStore};
pub use roles::RoleSlug;
pub use seed::{seed_if_empty, SeedReport};
pub use store::{MemoryPolicyStore, PolicyStore, SeaOrmPolicyStore};
