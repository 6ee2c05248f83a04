//! User routes: profile, dashboard, and the identity provider's webhook
//! (create/update/delete propagation).

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::identity::{self, AuthUser, IdentityEvent};
use crate::models::{Order, User};
use crate::response::ApiResponse;
use crate::state::AppState;

const RECENT_ORDER_COUNT: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me).patch(update_me))
        .route("/users/me/dashboard", get(dashboard))
        .route("/users/webhook", post(identity_webhook))
}

async fn me(AuthUser(user): AuthUser) -> Json<ApiResponse<User>> {
    ApiResponse::ok(user)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    name: Option<String>,
    avatar_url: Option<String>,
}

async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let updated = sqlx::query_as::<_, User>(
        "UPDATE users SET \
         name = COALESCE($2, name), \
         avatar_url = COALESCE($3, avatar_url), \
         updated_at = NOW() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(user.id)
    .bind(&req.name)
    .bind(&req.avatar_url)
    .fetch_one(&state.db)
    .await?;
    Ok(ApiResponse::ok(updated))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardStats {
    orders: i64,
    wishlist_items: i64,
    reviews: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Dashboard {
    user: User,
    stats: DashboardStats,
    recent_orders: Vec<Order>,
}

async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Dashboard>>, ApiError> {
    let (orders, wishlist_items, reviews): (i64, i64, i64) = sqlx::query_as(
        "SELECT \
         (SELECT COUNT(*) FROM orders WHERE buyer_id = $1), \
         (SELECT COUNT(*) FROM wishlist_items WHERE user_id = $1), \
         (SELECT COUNT(*) FROM reviews WHERE user_id = $1)",
    )
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    let recent_orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user.id)
    .bind(RECENT_ORDER_COUNT)
    .fetch_all(&state.db)
    .await?;

    Ok(ApiResponse::ok(Dashboard {
        user,
        stats: DashboardStats {
            orders,
            wishlist_items,
            reviews,
        },
        recent_orders,
    }))
}

/// Inbound events from the identity provider. Unknown event names are
/// acknowledged and ignored so the provider does not retry them forever.
async fn identity_webhook(
    State(state): State<AppState>,
    Json(event): Json<IdentityEvent>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    match event.kind.as_str() {
        "user.created" | "user.updated" => {
            let profile = &event.data;
            identity::upsert_user(
                &state.db,
                &profile.id,
                &profile.primary_email().unwrap_or_default(),
                &profile.full_name(),
                profile.image_url.as_deref(),
                crate::models::UserRole::Buyer,
            )
            .await?;
            tracing::info!(external_id = %profile.id, kind = %event.kind, "identity event applied");
        }
        "user.deleted" => {
            sqlx::query("DELETE FROM users WHERE external_id = $1")
                .bind(&event.data.id)
                .execute(&state.db)
                .await?;
            tracing::info!(external_id = %event.data.id, "identity deletion applied");
        }
        other => {
            tracing::debug!(kind = %other, "ignoring identity event");
        }
    }
    Ok(ApiResponse::ok(json!({ "received": true })))
}
