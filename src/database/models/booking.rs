use once_cell::sync::Lazy;

use super::schema::{Expansion, Field, Schema};
use super::tour::TOUR_SCHEMA;
use super::user::USER_SCHEMA;

pub static BOOKING_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new("bookings")
        .with(Field::reference("tour").required("Booking must belong to a Tour!"))
        .with(Field::reference("user").required("Booking must belong to a User!"))
        .with(Field::number("price").required("Booking must have a price."))
        .with(Field::boolean("paid").default_value(true))
});

pub fn booking_expansions() -> Vec<Expansion> {
    vec![
        Expansion::Reference { field: "user", target: &USER_SCHEMA, select: &[] },
        Expansion::Reference { field: "tour", target: &TOUR_SCHEMA, select: &["name"] },
    ]
}
