//! Administrative HTTP routes

use axum::{
    extract::{Query, State},
    routing::{delete, get, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use warden_rbac::{AdminService, AuthContext, MenuNode, RoleSlug, UserId};

use crate::error::{ApiError, ApiResult};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub admin: AdminService,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleIdQuery {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRolesRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRolePermissionRequest {
    pub role: String,
    #[serde(default)]
    pub list: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub list: Vec<T>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub added: usize,
    pub removed: usize,
}

/// Routes of the admin surface, without authorization layers
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/menus", get(user_menus))
        .route("/v1/admin/menus", get(all_menus))
        .route("/v1/admin/user/permissions", get(user_permissions))
        .route("/v1/admin/user/roles", get(user_roles).put(update_user_roles))
        .route("/v1/admin/user", delete(delete_user))
        .route("/v1/admin/role/permissions", get(role_permissions))
        .route("/v1/admin/role/permission", put(update_role_permission))
        .route("/v1/admin/role", delete(delete_role))
}

fn parse_role(role: &str) -> ApiResult<RoleSlug> {
    RoleSlug::new(role).map_err(ApiError::from)
}

async fn user_menus(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListResponse<MenuNode>>> {
    let list = state.admin.user_menus(auth.user_id).await?;
    Ok(Json(ListResponse { list }))
}

async fn all_menus(State(state): State<AppState>) -> ApiResult<Json<ListResponse<MenuNode>>> {
    let list = state.admin.all_menus().await?;
    Ok(Json(ListResponse { list }))
}

async fn user_permissions(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<ListResponse<String>>> {
    let list = state.admin.get_user_permissions(query.id).await?;
    Ok(Json(ListResponse { list }))
}

async fn user_roles(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<ListResponse<String>>> {
    let list = state.admin.get_user_roles(query.id).await?;
    Ok(Json(ListResponse { list }))
}

async fn update_user_roles(
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRolesRequest>,
) -> ApiResult<Json<SyncResponse>> {
    let report = state
        .admin
        .update_user_roles(request.user_id, request.roles.as_slice())
        .await?;

    Ok(Json(SyncResponse {
        added: report.added,
        removed: report.removed,
    }))
}

async fn delete_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<SyncResponse>> {
    let removal = state.admin.delete_user(query.id).await?;
    Ok(Json(SyncResponse {
        added: 0,
        removed: removal.grants + removal.memberships,
    }))
}

async fn role_permissions(
    State(state): State<AppState>,
    Query(query): Query<RoleQuery>,
) -> ApiResult<Json<ListResponse<String>>> {
    let role = parse_role(&query.role)?;
    let list = state.admin.get_role_permissions(&role).await?;
    Ok(Json(ListResponse { list }))
}

async fn update_role_permission(
    State(state): State<AppState>,
    Json(request): Json<UpdateRolePermissionRequest>,
) -> ApiResult<Json<SyncResponse>> {
    let role = parse_role(&request.role)?;
    let report = state
        .admin
        .update_role_permissions(&role, request.list.as_slice())
        .await?;

    Ok(Json(SyncResponse {
        added: report.added,
        removed: report.removed,
    }))
}

async fn delete_role(
    State(state): State<AppState>,
    Query(query): Query<RoleIdQuery>,
) -> ApiResult<Json<SyncResponse>> {
    let removal = state.admin.delete_role(query.id).await?;
    Ok(Json(SyncResponse {
        added: 0,
        removed: removal.grants + removal.memberships,
    }))
}
