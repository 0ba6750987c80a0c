use axum::Router;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use super::factory::{self, Resource};
use crate::database::models::{review_expansions, Role, REVIEW_SCHEMA};
use crate::database::{Document, DocumentStore, StoreError};
use crate::middleware::{protected, restricted};
use crate::services::ratings::recalculate_tour_ratings;
use crate::state::AppState;

pub const AUTHORS: &[Role] = &[Role::User];
const EDITORS: &[Role] = &[Role::User, Role::Admin];

/// Reviews carry their author; every write refreshes the reviewed tour's ratings.
pub fn resource() -> Resource {
    Resource::new(&REVIEW_SCHEMA)
        .expand_one(review_expansions)
        .expand_many(review_expansions)
        .owned_by("user")
        .on_change(refresh_tour_ratings)
}

/// A review moved to another tour refreshes both the old and the new tour.
fn refresh_tour_ratings<'a>(
    store: &'a dyn DocumentStore,
    previous: Option<&'a Document>,
    review: &'a Document,
) -> BoxFuture<'a, Result<(), StoreError>> {
    async move {
        let tour_of = |doc: &'a Document| doc.get("tour").and_then(Value::as_str);
        let current = tour_of(review);
        if let Some(tour) = current {
            recalculate_tour_ratings(store, tour).await?;
        }
        match previous.and_then(tour_of) {
            Some(old) if Some(old) != current => recalculate_tour_ratings(store, old).await,
            _ => Ok(()),
        }
    }
    .boxed()
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let reviews = resource();

    Router::new()
        .route(
            "/",
            protected(state, factory::get_all(reviews.clone()))
                .merge(restricted(state, AUTHORS, factory::create_one(reviews.clone()))),
        )
        .route(
            "/:id",
            protected(state, factory::get_one(reviews.clone())).merge(restricted(
                state,
                EDITORS,
                factory::update_one(reviews.clone()).merge(factory::delete_one(reviews)),
            )),
        )
}
