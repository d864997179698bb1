use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use tower::ServiceExt;

use staybook::config::AppConfig;
use staybook::db;
use staybook::handlers;
use staybook::models::BookingStatus;
use staybook::services::tasks::{self, BookingEvent, EventReceiver};
use staybook::state::AppState;

// ── Helpers ──

const ADMIN: &str = "Bearer test-token";

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
    }
}

fn test_state() -> Arc<AppState> {
    test_state_with_events().0
}

fn test_state_with_events() -> (Arc<AppState>, EventReceiver) {
    let conn = db::init_db(":memory:").unwrap();
    let (events, receiver) = tasks::channel();
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        events,
    });
    (state, receiver)
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

fn json_request(
    method: &str,
    uri: &str,
    user: Option<&str>,
    auth: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn decimal(value: &serde_json::Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

async fn create_listing(state: &Arc<AppState>, host: &str, price: &str, max_guests: u32) -> String {
    let (status, json) = send(
        state,
        json_request(
            "POST",
            "/api/listings",
            Some(host),
            None,
            Some(serde_json::json!({
                "title": "Garden villa",
                "description": "Quiet villa with a pool",
                "property_type": "VILLA",
                "price_per_night": price,
                "bedrooms": 3,
                "bathrooms": 2,
                "max_guests": max_guests,
                "address": "12 Acacia Lane",
                "city": "Nairobi",
                "country": "Kenya",
                "amenities": {"pool": true}
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_str().unwrap().to_string()
}

async fn book(
    state: &Arc<AppState>,
    guest: &str,
    listing_id: &str,
    check_in: &str,
    check_out: &str,
) -> (StatusCode, serde_json::Value) {
    send(
        state,
        json_request(
            "POST",
            "/api/bookings",
            Some(guest),
            None,
            Some(serde_json::json!({
                "listing_id": listing_id,
                "check_in": check_in,
                "check_out": check_out,
                "number_of_guests": 2,
                "special_requests": "Late arrival"
            })),
        ),
    )
    .await
}

async fn set_status(state: &Arc<AppState>, booking_id: &str, status: &str) -> (StatusCode, serde_json::Value) {
    send(
        state,
        json_request(
            "PATCH",
            &format!("/api/bookings/{booking_id}/status"),
            None,
            Some(ADMIN),
            Some(serde_json::json!({ "status": status })),
        ),
    )
    .await
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

// ── Listings ──

#[tokio::test]
async fn test_create_listing_requires_identity() {
    let state = test_state();
    let (status, _) = send(
        &state,
        json_request(
            "POST",
            "/api/listings",
            None,
            None,
            Some(serde_json::json!({
                "title": "Loft",
                "property_type": "APARTMENT",
                "price_per_night": "50",
                "max_guests": 2,
                "city": "Nairobi",
                "country": "Kenya"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_admin_token_rejected() {
    let state = test_state();
    let (status, json) = send(
        &state,
        json_request("GET", "/api/bookings", None, Some("Bearer wrong-token"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_listing_lifecycle() {
    let state = test_state();
    let id = create_listing(&state, "host-1", "100.00", 4).await;

    let (status, json) = send(&state, json_request("GET", &format!("/api/listings/{id}"), None, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["host_id"], "host-1");
    assert_eq!(json["property_type"], "VILLA");
    assert_eq!(json["average_rating"], 0.0);
    assert_eq!(decimal(&json["price_per_night"]), Decimal::new(100, 0));

    // Someone else cannot edit it
    let (status, json) = send(
        &state,
        json_request(
            "PATCH",
            &format!("/api/listings/{id}"),
            Some("host-2"),
            None,
            Some(serde_json::json!({ "price_per_night": "10" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["field"], "user");

    let (status, json) = send(
        &state,
        json_request(
            "PATCH",
            &format!("/api/listings/{id}"),
            Some("host-1"),
            None,
            Some(serde_json::json!({ "price_per_night": "120", "max_guests": 6 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["max_guests"], 6);

    let (status, _) = send(
        &state,
        json_request("DELETE", &format!("/api/listings/{id}"), Some("host-1"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&state, json_request("GET", &format!("/api/listings/{id}"), None, None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&state, json_request("GET", "/api/listings", None, None, None)).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_negative_price_rejected() {
    let state = test_state();
    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/api/listings",
            Some("host-1"),
            None,
            Some(serde_json::json!({
                "title": "Shed",
                "property_type": "OTHER",
                "price_per_night": "-1",
                "max_guests": 1,
                "city": "Nakuru",
                "country": "Kenya"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "price_per_night");
}

#[tokio::test]
async fn test_listing_filters_and_ordering() {
    let state = test_state();
    let cheap = create_listing(&state, "host-1", "90", 2).await;
    let pricey = create_listing(&state, "host-1", "1000", 8).await;
    let mid = create_listing(&state, "host-2", "120", 4).await;

    let (status, json) = send(
        &state,
        json_request("GET", "/api/listings?ordering=-price_per_night", None, None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![pricey.as_str(), mid.as_str(), cheap.as_str()]);

    let (_, json) = send(
        &state,
        json_request("GET", "/api/listings?bedrooms=3&bathrooms=2", None, None, None),
    )
    .await;
    assert_eq!(json.as_array().unwrap().len(), 3);

    let (_, json) = send(&state, json_request("GET", "/api/listings?bedrooms=5", None, None, None)).await;
    assert_eq!(json.as_array().unwrap().len(), 0);

    let (status, _) = send(&state, json_request("GET", "/api/listings?ordering=title", None, None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &state,
        json_request(
            "PATCH",
            &format!("/api/listings/{cheap}"),
            Some("host-1"),
            None,
            Some(serde_json::json!({ "latitude": "-1.2921", "longitude": "36.8219" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["latitude"]), Decimal::new(-12921, 4));
}

// ── Booking Scenarios ──

#[tokio::test]
async fn test_booking_scenarios() {
    let (state, mut events) = test_state_with_events();
    let listing = create_listing(&state, "host-1", "100", 4).await;

    // A: four nights at 100
    let (status, a) = book(&state, "guest-a", &listing, "2024-06-01", "2024-06-05").await;
    assert_eq!(status, StatusCode::CREATED, "{a}");
    assert_eq!(a["status"], "PENDING");
    assert_eq!(decimal(&a["total_price"]), Decimal::new(400, 0));
    assert_eq!(a["guest_id"], "guest-a");

    match events.try_recv().unwrap() {
        BookingEvent::Created { booking_id, total_price, .. } => {
            assert_eq!(booking_id, a["id"].as_str().unwrap());
            assert_eq!(total_price, Decimal::new(400, 0));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // B overlaps A on June 4
    let (status, b) = book(&state, "guest-b", &listing, "2024-06-04", "2024-06-06").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(b["field"], "check_in");
    assert!(events.try_recv().is_err());

    // C starts the day A ends
    let (status, c) = book(&state, "guest-c", &listing, "2024-06-05", "2024-06-07").await;
    assert_eq!(status, StatusCode::CREATED, "{c}");
    assert_eq!(decimal(&c["total_price"]), Decimal::new(200, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_book_once() {
    let state = test_state();
    let listing = create_listing(&state, "host-1", "100", 4).await;

    let mut handles = vec![];
    for i in 0..16 {
        let state = state.clone();
        let listing = listing.clone();
        handles.push(tokio::spawn(async move {
            book(&state, &format!("guest-{i}"), &listing, "2024-06-01", "2024-06-05").await
        }));
    }

    let mut created = 0;
    for handle in handles {
        let (status, json) = handle.await.unwrap();
        match status {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => assert_eq!(json["field"], "check_in"),
            other => panic!("unexpected status {other}: {json}"),
        }
    }
    assert_eq!(created, 1);

    let (_, all) = send(&state, json_request("GET", "/api/bookings", None, Some(ADMIN), None)).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_transitions_over_http() {
    let (state, mut events) = test_state_with_events();
    let listing = create_listing(&state, "host-1", "100", 4).await;
    let (_, a) = book(&state, "guest-a", &listing, "2024-06-01", "2024-06-05").await;
    let id = a["id"].as_str().unwrap().to_string();
    events.try_recv().unwrap();

    // Guests cannot move status, anonymous callers are not known at all
    let (status, json) = send(
        &state,
        json_request(
            "PATCH",
            &format!("/api/bookings/{id}/status"),
            Some("guest-a"),
            None,
            Some(serde_json::json!({ "status": "CONFIRMED" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["field"], "user");

    let (status, _) = send(
        &state,
        json_request(
            "PATCH",
            &format!("/api/bookings/{id}/status"),
            None,
            None,
            Some(serde_json::json!({ "status": "CONFIRMED" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = set_status(&state, &id, "CONFIRMED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(
        events.try_recv().unwrap(),
        BookingEvent::StatusChanged {
            booking_id: id.clone(),
            from: BookingStatus::Pending,
            to: BookingStatus::Confirmed,
        }
    );

    let (status, json) = set_status(&state, &id, "PENDING").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "cannot change status from CONFIRMED to PENDING");
    assert_eq!(json["field"], "status");

    let (status, _) = set_status(&state, &id, "ARCHIVED").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = send(
        &state,
        json_request("GET", &format!("/api/bookings/{id}"), Some("guest-a"), None, None),
    )
    .await;
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(decimal(&json["total_price"]), Decimal::new(400, 0));
}

#[tokio::test]
async fn test_cancelled_booking_frees_dates() {
    let state = test_state();
    let listing = create_listing(&state, "host-1", "100", 4).await;
    let (_, a) = book(&state, "guest-a", &listing, "2024-06-01", "2024-06-05").await;

    let (status, _) = set_status(&state, a["id"].as_str().unwrap(), "CANCELLED").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = book(&state, "guest-b", &listing, "2024-06-02", "2024-06-04").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_booking_validation_errors() {
    let state = test_state();
    let listing = create_listing(&state, "host-1", "100", 2).await;

    let (status, json) = book(&state, "guest-a", &listing, "2024-06-05", "2024-06-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "check_out");

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/api/bookings",
            Some("guest-a"),
            None,
            Some(serde_json::json!({
                "listing_id": listing,
                "check_in": "2024-06-01",
                "check_out": "2024-06-03",
                "number_of_guests": 3
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "number_of_guests");

    let (status, _) = book(&state, "guest-a", "no-such-listing", "2024-06-01", "2024-06-03").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_availability_endpoint_and_search() {
    let state = test_state();
    let listing = create_listing(&state, "host-1", "100", 4).await;
    book(&state, "guest-a", &listing, "2024-06-01", "2024-06-05").await;

    let (status, json) = send(
        &state,
        json_request(
            "GET",
            &format!("/api/listings/{listing}/availability?check_in=2024-06-04&check_out=2024-06-06"),
            None,
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["available"], false);

    let (_, json) = send(
        &state,
        json_request(
            "GET",
            &format!("/api/listings/{listing}/availability?check_in=2024-06-05&check_out=2024-06-06"),
            None,
            None,
            None,
        ),
    )
    .await;
    assert_eq!(json["available"], true);

    let (status, json) = send(
        &state,
        json_request(
            "GET",
            "/api/listings?city=nairobi&check_in=2024-06-03&check_out=2024-06-04",
            None,
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["id"], listing.as_str());
    assert_eq!(json[0]["is_available"], false);

    let (status, _) = send(
        &state,
        json_request(
            "GET",
            "/api/listings?check_in=2024-06-04&check_out=2024-06-04",
            None,
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_visibility() {
    let state = test_state();
    let listing = create_listing(&state, "host-1", "100", 4).await;
    let (_, a) = book(&state, "guest-a", &listing, "2024-06-01", "2024-06-05").await;
    book(&state, "guest-b", &listing, "2024-06-10", "2024-06-12").await;

    let (_, mine) = send(&state, json_request("GET", "/api/bookings", Some("guest-a"), None, None)).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["id"], a["id"]);

    let (_, all) = send(&state, json_request("GET", "/api/bookings", None, Some(ADMIN), None)).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, pending) = send(
        &state,
        json_request("GET", "/api/bookings?status=pending", None, Some(ADMIN), None),
    )
    .await;
    assert_eq!(pending.as_array().unwrap().len(), 2);

    let (status, _) = send(
        &state,
        json_request(
            "GET",
            &format!("/api/bookings/{}", a["id"].as_str().unwrap()),
            Some("guest-b"),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&state, json_request("GET", "/api/bookings", None, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, by_guest) = send(
        &state,
        json_request(
            "GET",
            "/api/bookings?guest_id=guest-b&ordering=check_in",
            None,
            Some(ADMIN),
            None,
        ),
    )
    .await;
    assert_eq!(by_guest.as_array().unwrap().len(), 1);
    assert_eq!(by_guest[0]["guest_id"], "guest-b");

    let (status, _) = send(
        &state,
        json_request("GET", "/api/bookings?ordering=guest_id", None, Some(ADMIN), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reschedule_is_staff_only_and_reprices() {
    let state = test_state();
    let listing = create_listing(&state, "host-1", "100", 4).await;
    let (_, a) = book(&state, "guest-a", &listing, "2024-06-01", "2024-06-05").await;
    let uri = format!("/api/bookings/{}", a["id"].as_str().unwrap());
    let change = serde_json::json!({
        "check_in": "2024-06-03",
        "check_out": "2024-06-06",
        "number_of_guests": 1
    });

    let (status, _) = send(&state, json_request("PUT", &uri, Some("guest-a"), None, Some(change.clone()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&state, json_request("PUT", &uri, None, Some(ADMIN), Some(change))).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["check_in"], "2024-06-03");
    assert_eq!(decimal(&json["total_price"]), Decimal::new(300, 0));
}

// ── Reviews ──

#[tokio::test]
async fn test_review_flow() {
    let state = test_state();
    let listing = create_listing(&state, "host-1", "100", 4).await;
    let (_, a) = book(&state, "guest-a", &listing, "2024-06-01", "2024-06-05").await;
    let id = a["id"].as_str().unwrap().to_string();
    let review_uri = format!("/api/bookings/{id}/review");

    // Not completed yet
    let (status, json) = send(
        &state,
        json_request("POST", &review_uri, Some("guest-a"), None, Some(serde_json::json!({"rating": 5}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["field"], "status");

    set_status(&state, &id, "CONFIRMED").await;
    set_status(&state, &id, "COMPLETED").await;

    let (status, _) = send(
        &state,
        json_request("POST", &review_uri, Some("guest-b"), None, Some(serde_json::json!({"rating": 5}))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &state,
        json_request("POST", &review_uri, Some("guest-a"), None, Some(serde_json::json!({"rating": 9}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "rating");

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            &review_uri,
            Some("guest-a"),
            None,
            Some(serde_json::json!({"rating": 4, "comment": "Great pool"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["rating"], 4);
    assert_eq!(json["listing_id"], listing.as_str());

    let (status, json) = send(
        &state,
        json_request("POST", &review_uri, Some("guest-a"), None, Some(serde_json::json!({"rating": 2}))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "you have already reviewed this booking");

    let (_, reviews) = send(
        &state,
        json_request("GET", &format!("/api/listings/{listing}/reviews"), None, None, None),
    )
    .await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["comment"], "Great pool");

    let (_, json) = send(&state, json_request("GET", &format!("/api/listings/{listing}"), None, None, None)).await;
    assert_eq!(json["average_rating"], 4.0);
}
