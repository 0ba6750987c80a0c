use once_cell::sync::Lazy;

use super::schema::{Expansion, Field, Schema};
use super::user::USER_SCHEMA;

pub static REVIEW_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new("reviews")
        .with(Field::text("review").required("A review is required"))
        .with(
            Field::number("rating")
                .required("A review must have a rating")
                .min(1.0, "Rating must be above 1.0")
                .max(5.0, "Rating must be below 5.0"),
        )
        .with(Field::reference("tour").required("Review is must belong to a tour"))
        .with(Field::reference("user").required("Review is must belong to a user"))
        .unique_together(&["tour", "user"])
});

/// Reviews always carry their author's public profile.
pub fn review_expansions() -> Vec<Expansion> {
    vec![Expansion::Reference { field: "user", target: &USER_SCHEMA, select: &["name", "photo"] }]
}
