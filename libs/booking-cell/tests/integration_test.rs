use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::router::booking_routes;
use shared_config::AppConfig;

fn create_test_app(mock_server: &MockServer) -> Router {
    let config = AppConfig {
        data_api_url: mock_server.uri(),
        data_api_key: "test-key".to_string(),
    };
    booking_routes(Arc::new(config))
}

fn book_body(slot_start: &str, duration_minutes: i64) -> Value {
    json!({
        "doctor_id": Uuid::new_v4(),
        "branch_id": Uuid::new_v4(),
        "patient_id": Uuid::new_v4(),
        "slot_start": slot_start,
        "duration_minutes": duration_minutes
    })
}

fn post_booking(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/appointments")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_book_endpoint_returns_created_appointment() {
    let mock_server = MockServer::start().await;
    let body = book_body("2024-06-03T09:00:00Z", 30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let created_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": created_id,
            "patient_id": body["patient_id"],
            "doctor_id": body["doctor_id"],
            "branch_id": body["branch_id"],
            "scheduled_at": "2024-06-03T09:00:00Z",
            "end_at": "2024-06-03T09:30:00Z",
            "status": "pending",
            "note": null
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = create_test_app(&mock_server)
        .oneshot(post_booking(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["id"], json!(created_id));
    assert_eq!(json["status"], "pending");
}

#[tokio::test]
async fn test_book_endpoint_answers_conflict_when_slot_is_full() {
    let mock_server = MockServer::start().await;

    // Two existing appointments fill the default capacity of two.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4(),
                "scheduled_at": "2024-06-03T09:00:00Z",
                "end_at": "2024-06-03T09:30:00Z",
                "status": "confirmed"
            },
            {
                "id": Uuid::new_v4(),
                "scheduled_at": "2024-06-03T09:00:00Z",
                "end_at": "2024-06-03T09:30:00Z",
                "status": "pending"
            }
        ])))
        .mount(&mock_server)
        .await;

    let response = create_test_app(&mock_server)
        .oneshot(post_booking(&book_body("2024-06-03T09:00:00Z", 30)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = response_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("capacity"));
}

#[tokio::test]
async fn test_book_endpoint_rejects_nonpositive_duration() {
    let mock_server = MockServer::start().await;

    let response = create_test_app(&mock_server)
        .oneshot(post_booking(&book_body("2024-06-03T09:00:00Z", -30)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_details_endpoint_resolves_comma_separated_ids() {
    let mock_server = MockServer::start().await;

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_details"))
        .and(header("authorization", "Bearer reception-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": first,
                "scheduled_at": "2024-06-03T09:00:00Z",
                "status": "confirmed",
                "ovog": "Дорж",
                "name": "Оюун",
                "book_number": "B-7"
            },
            {
                "id": second,
                "scheduled_at": "2024-06-03T09:15:00Z",
                "status": "pending",
                "name": "Сараа"
            }
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/appointments?ids={},{}", first, second))
        .header("authorization", "Bearer reception-token")
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(&mock_server)
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["appointments"][0]["name"], "Оюун");
}

#[tokio::test]
async fn test_details_endpoint_rejects_malformed_ids() {
    let mock_server = MockServer::start().await;

    let request = Request::builder()
        .method("GET")
        .uri("/appointments?ids=not-a-uuid")
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(&mock_server)
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
