use axum::Router;

use super::factory::{self, Resource};
use super::reviews;
use crate::database::models::{tour_expansions, tour_list_expansions, Role, TOUR_SCHEMA};
use crate::middleware::{protected, restricted};
use crate::state::AppState;

pub const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide];

pub fn resource() -> Resource {
    Resource::new(&TOUR_SCHEMA)
        .expand_one(tour_expansions)
        .expand_many(tour_list_expansions)
}

/// Tours are public to read. `/:id/reviews` lists and creates reviews of one tour.
pub fn routes(state: &AppState) -> Router<AppState> {
    let tours = resource();
    let tour_reviews = reviews::resource().nested("id", "tour");

    Router::new()
        .route(
            "/",
            factory::get_all(tours.clone())
                .merge(restricted(state, STAFF, factory::create_one(tours.clone()))),
        )
        .route(
            "/:id",
            factory::get_one(tours.clone()).merge(restricted(
                state,
                STAFF,
                factory::update_one(tours.clone()).merge(factory::delete_one(tours)),
            )),
        )
        .route(
            "/:id/reviews",
            protected(state, factory::get_all(tour_reviews.clone()))
                .merge(restricted(state, reviews::AUTHORS, factory::create_one(tour_reviews))),
        )
}
