pub mod booking;
pub mod review;
pub mod schema;
pub mod tour;
pub mod user;

pub use booking::{booking_expansions, BOOKING_SCHEMA};
pub use review::{review_expansions, REVIEW_SCHEMA};
pub use schema::{timestamp, Expansion, Field, FieldKind, Schema};
pub use tour::{tour_expansions, tour_list_expansions, DEFAULT_RATINGS_AVERAGE, TOUR_SCHEMA};
pub use user::{Role, USER_SCHEMA};

/// Every persisted collection, used when creating indexes.
pub fn all_schemas() -> [&'static Schema; 4] {
    [&*TOUR_SCHEMA, &*USER_SCHEMA, &*REVIEW_SCHEMA, &*BOOKING_SCHEMA]
}
