//! Product catalog routes: filtered listing with facets, detail, related
//! products, and seller-side CRUD.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::catalog::{self, CatalogFilter, CatalogParams, FilterOptions, SortKey};
use crate::error::ApiError;
use crate::identity::AuthUser;
use crate::models::{Product, UserRole};
use crate::response::{ApiResponse, PageMeta};
use crate::state::AppState;

const RELATED_LIMIT: u32 = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(archive_product),
        )
        .route("/products/:id/related", get(related_products))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductPage {
    products: Vec<Product>,
    pagination: PageMeta,
    filters: FilterOptions,
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> Result<Json<ApiResponse<ProductPage>>, ApiError> {
    let filter = CatalogFilter::from(params);
    let (products, total) = catalog::run(&state.db, &filter).await?;
    let filters = catalog::filter_options(&state.db, filter.category.as_deref()).await?;
    Ok(ApiResponse::ok(ProductPage {
        products,
        pagination: PageMeta::new(filter.page, filter.limit, total),
        filters,
    }))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let product = fetch_active_product(&state, id).await?;
    Ok(ApiResponse::ok(product))
}

async fn related_products(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    let product = fetch_active_product(&state, id).await?;
    let filter = CatalogFilter {
        category: Some(product.category),
        exclude: Some(product.id),
        sort: SortKey::Relevance,
        page: 1,
        limit: RELATED_LIMIT,
        ..Default::default()
    };
    let (products, _) = catalog::run(&state.db, &filter).await?;
    Ok(ApiResponse::ok(products))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ProductRequest {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[serde(default)]
    description: String,
    #[validate(range(min = 0))]
    price: i64,
    #[serde(default)]
    images: Vec<String>,
    #[validate(length(min = 1, max = 100))]
    category: String,
    brand: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    inventory: i32,
}

async fn create_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), ApiError> {
    require_seller(&user.role)?;
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products \
         (id, seller_id, title, description, price, images, category, brand, tags, inventory) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.images)
    .bind(&req.category)
    .bind(&req.brand)
    .bind(&req.tags)
    .bind(req.inventory)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(product)))
}

async fn update_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    require_owner(&state, id, user.id).await?;
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products \
         SET title = $2, description = $3, price = $4, images = $5, category = $6, \
             brand = $7, tags = $8, inventory = $9, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.images)
    .bind(&req.category)
    .bind(&req.brand)
    .bind(&req.tags)
    .bind(req.inventory)
    .fetch_one(&state.db)
    .await?;
    Ok(ApiResponse::ok(product))
}

/// Soft delete: the row stays for order history, the listing disappears.
async fn archive_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_owner(&state, id, user.id).await?;
    sqlx::query("UPDATE products SET status = 'ARCHIVED', updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_active_product(state: &AppState, id: Uuid) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND status = 'ACTIVE'")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("product"))
}

fn require_seller(role: &UserRole) -> Result<(), ApiError> {
    if *role == UserRole::Seller {
        Ok(())
    } else {
        Err(ApiError::Forbidden("seller account required".into()))
    }
}

async fn require_owner(state: &AppState, product_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
    let seller_id: Option<Uuid> =
        sqlx::query_scalar("SELECT seller_id FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&state.db)
            .await?;
    match seller_id {
        None => Err(ApiError::NotFound("product")),
        Some(seller) if seller == user_id => Ok(()),
        Some(_) => Err(ApiError::Forbidden(
            "you do not own this product".into(),
        )),
    }
}
