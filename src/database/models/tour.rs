use once_cell::sync::Lazy;
use serde_json::Value;

use super::review::{review_expansions, REVIEW_SCHEMA};
use super::schema::{Expansion, Field, Schema};
use super::user::USER_SCHEMA;
use crate::database::Document;
use crate::filter::FilterWhereInfo;

/// Average assigned to a tour while it has no reviews.
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

pub static TOUR_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new("tours")
        .with(
            Field::text("name")
                .required("A tour must have a name")
                .unique()
                .trim()
                .max_length(40, "A tour name must have less or equal then 40 characters")
                .min_length(10, "A tour name must have more or equal then 10 characters"),
        )
        .with(Field::number("duration").required("A tour must have a duration"))
        .with(Field::number("maxGroupSize").required("A tour must have a group size"))
        .with(
            Field::text("difficulty")
                .required("A tour must have a difficulty")
                .one_of(&["easy", "medium", "difficult"], "Difficulty is either: easy, medium, difficult"),
        )
        .with(
            Field::number("ratingsAverage")
                .default_value(DEFAULT_RATINGS_AVERAGE)
                .min(1.0, "Rating must be above 1.0")
                .max(5.0, "Rating must be below 5.0"),
        )
        .with(Field::number("ratingsQuantity").default_value(0))
        .with(Field::number("price").required("A tour must have a price"))
        .with(Field::number("priceDiscount"))
        .with(Field::text("summary").required("A tour must have a description").trim())
        .with(Field::text("description").trim())
        .with(Field::text("imageCover").required("A tour must have a cover image"))
        .with(Field::text_list("images"))
        .with(Field::json("startDates"))
        .with(Field::boolean("secretTour").default_value(false))
        .with(Field::json("startLocation"))
        .with(Field::json("locations"))
        .with(Field::references("guides"))
        .scoped(FilterWhereInfo::eq("secretTour", false))
        .check(discount_below_price)
});

fn discount_below_price(doc: &Document) -> Option<String> {
    let discount = doc.get("priceDiscount").and_then(Value::as_f64)?;
    let price = doc.get("price").and_then(Value::as_f64)?;
    (discount >= price).then(|| format!("Discount price ({}) should be below regular price", discount))
}

/// Expansions resolved when a single tour is read.
pub fn tour_expansions() -> Vec<Expansion> {
    let mut expansions = vec![Expansion::Virtual {
        field: "reviews",
        target: &REVIEW_SCHEMA,
        foreign_field: "tour",
        nested: review_expansions(),
    }];
    expansions.extend(tour_list_expansions());
    expansions
}

/// Guides are resolved on every tour read, lists included.
pub fn tour_list_expansions() -> Vec<Expansion> {
    vec![Expansion::Reference { field: "guides", target: &USER_SCHEMA, select: &[] }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    pub fn tour_body() -> Document {
        json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn defaults_ratings() {
        let doc = TOUR_SCHEMA.prepare_insert(tour_body(), Utc::now()).unwrap();
        assert_eq!(doc["ratingsAverage"], json!(4.5));
        assert_eq!(doc["ratingsQuantity"], json!(0));
        assert_eq!(doc["secretTour"], json!(false));
    }

    #[test]
    fn discount_must_be_below_price() {
        let mut body = tour_body();
        body.insert("priceDiscount".into(), json!(400));
        let err = TOUR_SCHEMA.prepare_insert(body, Utc::now()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: Discount price (400) should be below regular price"
        );
    }

    #[test]
    fn difficulty_is_an_enum() {
        let mut body = tour_body();
        body.insert("difficulty".into(), json!("extreme"));
        assert!(TOUR_SCHEMA.prepare_insert(body, Utc::now()).is_err());
    }
}
