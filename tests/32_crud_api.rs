mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;
use natours_api::database::models::{Role, TOUR_SCHEMA};

fn tour_body(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "duration": 7,
        "maxGroupSize": 15,
        "difficulty": "medium",
        "price": 497,
        "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
        "imageCover": "tour-2-cover.jpg",
        "startDates": ["2021-06-19T09:00:00.000Z", "2021-07-20T09:00:00.000Z"]
    })
}

#[tokio::test]
async fn create_then_read_returns_the_same_fields() {
    let app = TestApp::new();
    let (admin, _) = app.admin().await;

    let res = app.post("/api/v1/tours", Some(&admin), tour_body("The Sea Explorer")).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let created = res.body["data"]["data"].clone();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["ratingsAverage"], 4.5);

    let res = app.get(&format!("/api/v1/tours/{}", id), None).await;
    assert_eq!(res.status, StatusCode::OK);
    let read = &res.body["data"]["data"];
    for key in ["name", "duration", "maxGroupSize", "difficulty", "price", "summary", "startDates", "createdAt"] {
        assert_eq!(read[key], created[key], "field {}", key);
    }
    assert_eq!(read["reviews"], json!([]));
}

#[tokio::test]
async fn create_reports_validation_errors() {
    let app = TestApp::new();
    let (admin, _) = app.admin().await;

    let mut body = tour_body("Short");
    body["difficulty"] = json!("extreme");
    let res = app.post("/api/v1/tours", Some(&admin), body).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.message().starts_with("Invalid input data. "), "{}", res.message());
    assert!(res.message().contains("Difficulty is either: easy, medium, difficult"), "{}", res.message());

    app.post("/api/v1/tours", Some(&admin), tour_body("The Forest Hiker")).await;
    let res = app.post("/api/v1/tours", Some(&admin), tour_body("The Forest Hiker")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.message(), "Duplicate name value: The Forest Hiker. Please use another value!");
}

#[tokio::test]
async fn read_missing_or_malformed_ids() {
    let app = TestApp::new();

    let res = app.get("/api/v1/tours/5f7d2b4a-3a64-4b8e-9a43-6d5c2f1e0a11", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.message(), "No document found with that ID");

    let res = app.get("/api/v1/tours/wwwww", None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.message(), "Invalid id: wwwww");
}

#[tokio::test]
async fn update_is_partial_and_revalidated() {
    let app = TestApp::new();
    let (admin, _) = app.admin().await;
    let id = app.tour("The Wine Taster", 1997.0, json!({})).await;
    let uri = format!("/api/v1/tours/{}", id);

    let res = app.patch(&uri, Some(&admin), json!({"price": 1500})).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["data"]["price"], 1500.0);
    assert_eq!(res.body["data"]["data"]["name"], "The Wine Taster");

    let res = app.patch(&uri, Some(&admin), json!({"priceDiscount": 2000})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.message(),
        "Invalid input data. Discount price (2000) should be below regular price"
    );

    let res = app.patch(&uri, Some(&admin), json!({"createdAt": "2020-01-01T00:00:00.000Z"})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.message(), "Invalid input data. Field 'createdAt' is immutable");

    let res = app
        .patch("/api/v1/tours/5f7d2b4a-3a64-4b8e-9a43-6d5c2f1e0a11", Some(&admin), json!({"price": 1}))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_returns_no_content() {
    let app = TestApp::new();
    let (admin, _) = app.admin().await;
    let id = app.tour("The City Wanderer", 1197.0, json!({})).await;
    let uri = format!("/api/v1/tours/{}", id);

    let res = app.delete(&uri, Some(&admin)).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.body.is_null());

    assert_eq!(app.get(&uri, None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri, Some(&admin)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nested_reviews_fill_tour_and_user_and_update_ratings() {
    let app = TestApp::new();
    let tour = app.tour("The Park Camper", 1497.0, json!({})).await;
    let (author, author_id) = app.user("Laura Wilson", "laura@example.com", Role::User).await;
    let (other, _) = app.user("Ben Hadley", "ben@example.com", Role::User).await;
    let reviews_uri = format!("/api/v1/tours/{}/reviews", tour);

    let res = app
        .post(&reviews_uri, Some(&author), json!({"review": "Amazing!", "rating": 5}))
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let review = res.body["data"]["data"].clone();
    assert_eq!(review["tour"], tour.as_str());
    assert_eq!(review["user"], author_id.as_str());

    let res = app
        .post(&reviews_uri, Some(&author), json!({"review": "Again", "rating": 1}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.message().starts_with("Duplicate tour, user value"), "{}", res.message());

    app.post(&reviews_uri, Some(&other), json!({"review": "Decent", "rating": 4})).await;

    let stored = app.store.find_by_id(&TOUR_SCHEMA, &tour).await.unwrap().unwrap();
    assert_eq!(stored["ratingsQuantity"], 2.0);
    assert_eq!(stored["ratingsAverage"], 4.5);

    let res = app.get(&reviews_uri, Some(&other)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 2);
    assert_eq!(res.body["data"]["data"][0]["user"]["name"].is_string(), true);
    assert!(res.body["data"]["data"][0]["user"].get("email").is_none());

    let res = app.get(&format!("/api/v1/tours/{}", tour), None).await;
    assert_eq!(res.body["data"]["data"]["reviews"].as_array().unwrap().len(), 2);

    let review_uri = format!("/api/v1/reviews/{}", review["id"].as_str().unwrap());
    let res = app.delete(&review_uri, Some(&author)).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let stored = app.store.find_by_id(&TOUR_SCHEMA, &tour).await.unwrap().unwrap();
    assert_eq!(stored["ratingsQuantity"], 1.0);
    assert_eq!(stored["ratingsAverage"], 4.0);
}

#[tokio::test]
async fn last_review_removed_resets_ratings() {
    let app = TestApp::new();
    let tour = app.tour("The Northern Lights", 1497.0, json!({})).await;
    let (author, _) = app.user("Chris Dale", "chris@example.com", Role::User).await;

    let res = app
        .post(&format!("/api/v1/tours/{}/reviews", tour), Some(&author), json!({"review": "Cold", "rating": 2}))
        .await;
    let review_id = res.body["data"]["data"]["id"].as_str().unwrap().to_string();

    app.delete(&format!("/api/v1/reviews/{}", review_id), Some(&author)).await;

    let stored = app.store.find_by_id(&TOUR_SCHEMA, &tour).await.unwrap().unwrap();
    assert_eq!(stored["ratingsQuantity"], 0.0);
    assert_eq!(stored["ratingsAverage"], 4.5);
}

#[tokio::test]
async fn moving_a_review_refreshes_both_tours() {
    let app = TestApp::new();
    let from = app.tour("The Wine Taster", 1997.0, json!({})).await;
    let to = app.tour("The Sports Lover", 2997.0, json!({})).await;
    let (author, _) = app.user("Laura Wilson", "laura@example.com", Role::User).await;
    let (admin, _) = app.admin().await;

    let res = app
        .post(&format!("/api/v1/tours/{}/reviews", from), Some(&author), json!({"review": "Dry", "rating": 2}))
        .await;
    let review_id = res.body["data"]["data"]["id"].as_str().unwrap().to_string();

    let res = app
        .patch(&format!("/api/v1/reviews/{}", review_id), Some(&admin), json!({"tour": to}))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let old = app.store.find_by_id(&TOUR_SCHEMA, &from).await.unwrap().unwrap();
    assert_eq!(old["ratingsQuantity"], 0.0);
    assert_eq!(old["ratingsAverage"], 4.5);
    let new = app.store.find_by_id(&TOUR_SCHEMA, &to).await.unwrap().unwrap();
    assert_eq!(new["ratingsQuantity"], 1.0);
    assert_eq!(new["ratingsAverage"], 2.0);
}

#[tokio::test]
async fn only_users_write_reviews() {
    let app = TestApp::new();
    let tour = app.tour("The Star Gazer", 2997.0, json!({})).await;
    let (guide, _) = app.user("Kate Morrison", "kate@example.com", Role::Guide).await;

    let res = app
        .post(&format!("/api/v1/tours/{}/reviews", tour), Some(&guide), json!({"review": "Mine", "rating": 5}))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/api/v1/reviews", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_me_filters_fields_and_refuses_passwords() {
    let app = TestApp::new();
    let (token, _) = app.user("Sophie Louise Hart", "sophie@example.com", Role::User).await;

    let res = app
        .patch("/api/v1/users/updateMe", Some(&token), json!({"password": "newpass123"}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.message(),
        "This route is not allowed for password updates. Please use /updateMyPassword route"
    );

    let res = app
        .patch("/api/v1/users/updateMe", Some(&token), json!({"name": "Sophie Hart", "role": "admin"}))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["user"]["name"], "Sophie Hart");
    assert_eq!(res.body["data"]["user"]["role"], "user");
}

#[tokio::test]
async fn admin_manages_users() {
    let app = TestApp::new();
    let (admin, _) = app.admin().await;
    let (user, user_id) = app.user("Todd Ross", "todd@example.com", Role::User).await;

    let res = app.get("/api/v1/users", Some(&user)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/api/v1/users", Some(&admin)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 2);

    let res = app.post("/api/v1/users", Some(&admin), json!({"name": "x"})).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.message(), "This route is not defined! Please use /signup instead");

    let uri = format!("/api/v1/users/{}", user_id);
    let res = app.patch(&uri, Some(&admin), json!({"password": "hijacked1"})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.message(), "Invalid input data. Field 'password' cannot be set on this route");

    let res = app.patch(&uri, Some(&admin), json!({"role": "guide"})).await;
    assert_eq!(res.body["data"]["data"]["role"], "guide");
}

#[tokio::test]
async fn checkout_session_relays_the_gateway_session() {
    let app = TestApp::new();
    let tour = app.tour("The Forest Hiker", 397.0, json!({})).await;
    let (token, user_id) = app.user("Lisa Brown", "lisa@example.com", Role::User).await;

    let res = app
        .get(&format!("/api/v1/bookings/checkout-session/{}", tour), Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["session"]["id"], "cs_test_a1b2c3");

    let requests = app.payments.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.line_items[0].name, "The Forest Hiker Tour");
    assert_eq!(request.line_items[0].amount, 39700);
    assert_eq!(request.customer_email, "lisa@example.com");
    assert_eq!(
        request.success_url,
        format!("http://localhost:3000/?tour={}&user={}&price=397", tour, user_id)
    );

    drop(requests);
    let res = app
        .get("/api/v1/bookings/checkout-session/5f7d2b4a-3a64-4b8e-9a43-6d5c2f1e0a11", Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bookings_are_staff_only() {
    let app = TestApp::new();
    let (token, _) = app.user("Jim Kelly", "jim@example.com", Role::User).await;

    assert_eq!(app.get("/api/v1/bookings", Some(&token)).await.status, StatusCode::FORBIDDEN);

    let (admin, admin_id) = app.admin().await;
    let tour = app.tour("The Sports Lover", 2997.0, json!({})).await;
    let res = app
        .post("/api/v1/bookings", Some(&admin), json!({"tour": tour, "user": admin_id, "price": 2997}))
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["data"]["data"]["paid"], true);

    let res = app.get("/api/v1/bookings", Some(&admin)).await;
    assert_eq!(res.body["results"], 1);
    assert_eq!(res.body["data"]["data"][0]["tour"]["name"], "The Sports Lover");
}
