//! HTTP routes, one module per resource. Handlers translate a request into
//! queries against the persistence pool and shape the response envelope;
//! they hold no state of their own.

pub mod cart;
pub mod categories;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod search;
pub mod users;
pub mod wishlist;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(products::router())
        .merge(categories::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(wishlist::router())
        .merge(reviews::router())
        .merge(users::router())
        .merge(search::router())
}
