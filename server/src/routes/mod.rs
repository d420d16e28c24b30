use axum::Router;
use serde::{Deserialize, Deserializer};

use crate::http::AppState;

mod auth;
mod customers;
mod follow_ups;
mod hierarchies;
mod interactions;
mod loans;
mod payments;
pub(crate) mod users;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/users", users::router())
        .nest("/hierarchies", hierarchies::router())
        .nest("/customers", customers::router())
        .nest("/loans", loans::router())
        .nest("/payments", payments::router())
        .nest("/interactions", interactions::router())
        .nest("/follow-ups", follow_ups::router())
}

/// Tells an explicit `null` (`Some(None)`) apart from an absent field
/// (`None`, via `#[serde(default)]`).
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
