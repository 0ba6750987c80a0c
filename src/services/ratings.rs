use serde_json::{json, Value};
use tracing::debug;

use crate::database::models::{DEFAULT_RATINGS_AVERAGE, REVIEW_SCHEMA, TOUR_SCHEMA};
use crate::database::{DocumentStore, StoreError};
use crate::filter::{FilterWhereInfo, QueryRequest};

/// Review count and average rounded to one decimal; no reviews yields the default average.
pub fn summarize(ratings: &[f64]) -> (u64, f64) {
    if ratings.is_empty() {
        return (0, DEFAULT_RATINGS_AVERAGE);
    }
    let average = ratings.iter().sum::<f64>() / ratings.len() as f64;
    (ratings.len() as u64, (average * 10.0).round() / 10.0)
}

/// Recomputes `ratingsQuantity` and `ratingsAverage` of a tour from its reviews.
pub async fn recalculate_tour_ratings(store: &dyn DocumentStore, tour_id: &str) -> Result<(), StoreError> {
    let reviews = store
        .find(&REVIEW_SCHEMA, &QueryRequest::matching(vec![FilterWhereInfo::eq("tour", tour_id)]))
        .await?;
    let ratings: Vec<f64> = reviews
        .iter()
        .filter_map(|review| review.get("rating").and_then(Value::as_f64))
        .collect();
    let (quantity, average) = summarize(&ratings);

    let patch = json!({ "ratingsQuantity": quantity, "ratingsAverage": average });
    let updated = store
        .update_by_id(&TOUR_SCHEMA, tour_id, patch.as_object().cloned().unwrap_or_default())
        .await?;
    debug!(
        "Tour {} ratings: {} reviews, average {} ({})",
        tour_id,
        quantity,
        average,
        if updated.is_some() { "saved" } else { "tour not found" }
    );
    Ok(())
}
