use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio_test::assert_ok;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::models::{BookSlotRequest, BookingError};
use booking_cell::services::{BookingService, DirectBookingGateway};
use schedule_cell::services::{BookingGateway, SlotBooking};
use shared_config::AppConfig;

fn mock_config(server: &MockServer) -> AppConfig {
    AppConfig {
        data_api_url: server.uri(),
        data_api_key: "test-key".to_string(),
    }
}

fn instant(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn booking_request(slot_start: &str, duration_minutes: i64) -> BookSlotRequest {
    BookSlotRequest {
        doctor_id: Uuid::new_v4(),
        branch_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        slot_start: instant(slot_start),
        duration_minutes,
        note: None,
    }
}

fn appointment_row(scheduled_at: &str, end_at: &str, status: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "scheduled_at": scheduled_at,
        "end_at": end_at,
        "status": status
    })
}

fn created_row(request: &BookSlotRequest) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "patient_id": request.patient_id,
        "doctor_id": request.doctor_id,
        "branch_id": request.branch_id,
        "scheduled_at": request.slot_start.to_rfc3339(),
        "end_at": (request.slot_start + chrono::Duration::minutes(request.duration_minutes)).to_rfc3339(),
        "status": "pending",
        "note": null
    })
}

async fn mount_existing_appointments(server: &MockServer, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_book_slot_succeeds_when_cell_has_headroom() {
    let mock_server = MockServer::start().await;
    let request = booking_request("2024-06-03T09:00:00Z", 30);

    mount_existing_appointments(&mock_server, json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .and(header("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created_row(&request)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = BookingService::with_capacity(&mock_config(&mock_server), 30, 2);
    let appointment = assert_ok!(service.book_slot(request.clone(), None).await);

    assert_eq!(appointment.status, "pending");
    assert_eq!(appointment.scheduled_at, request.slot_start);
    assert_eq!(
        appointment.end_at,
        instant("2024-06-03T09:30:00Z")
    );
}

#[tokio::test]
async fn test_book_slot_rejects_cell_at_capacity() {
    let mock_server = MockServer::start().await;

    mount_existing_appointments(
        &mock_server,
        json!([
            appointment_row("2024-06-03T09:00:00Z", "2024-06-03T09:30:00Z", "confirmed"),
            appointment_row("2024-06-03T09:00:00Z", "2024-06-03T09:30:00Z", "pending"),
        ]),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = BookingService::with_capacity(&mock_config(&mock_server), 30, 2);
    let result = service
        .book_slot(booking_request("2024-06-03T09:00:00Z", 30), None)
        .await;

    assert_matches!(result, Err(BookingError::SlotFull));
}

#[tokio::test]
async fn test_capacity_check_covers_every_cell_of_a_long_booking() {
    let mock_server = MockServer::start().await;

    // Only the second half-hour of the requested hour is taken.
    mount_existing_appointments(
        &mock_server,
        json!([appointment_row(
            "2024-06-03T09:30:00Z",
            "2024-06-03T10:00:00Z",
            "confirmed"
        )]),
    )
    .await;

    let service = BookingService::with_capacity(&mock_config(&mock_server), 30, 1);
    let result = service
        .book_slot(booking_request("2024-06-03T09:00:00Z", 60), None)
        .await;

    assert_matches!(result, Err(BookingError::SlotFull));
}

#[tokio::test]
async fn test_cancelled_rows_do_not_block_booking() {
    let mock_server = MockServer::start().await;
    let request = booking_request("2024-06-03T09:00:00Z", 30);

    mount_existing_appointments(
        &mock_server,
        json!([appointment_row(
            "2024-06-03T09:00:00Z",
            "2024-06-03T09:30:00Z",
            "cancelled"
        )]),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created_row(&request)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = BookingService::with_capacity(&mock_config(&mock_server), 30, 1);
    let result = service.book_slot(request, None).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_book_slot_rejects_nonpositive_duration() {
    let mock_server = MockServer::start().await;
    let service = BookingService::with_capacity(&mock_config(&mock_server), 30, 2);

    let result = service
        .book_slot(booking_request("2024-06-03T09:00:00Z", 0), None)
        .await;

    assert_matches!(result, Err(BookingError::InvalidDuration(0)));
}

#[tokio::test]
async fn test_book_slot_rejects_longer_than_a_day_duration() {
    // No mocks mounted: validation has to reject before the capacity fetch,
    // and before any cell arithmetic can overflow.
    let mock_server = MockServer::start().await;
    let service = BookingService::with_capacity(&mock_config(&mock_server), 30, 2);

    let result = service
        .book_slot(booking_request("2024-06-03T09:00:00Z", i64::MAX), None)
        .await;

    assert_matches!(result, Err(BookingError::InvalidDuration(i64::MAX)));
}

#[tokio::test]
async fn test_second_booking_sees_the_first_and_rejects() {
    let mock_server = MockServer::start().await;
    let request = booking_request("2024-06-03T09:00:00Z", 30);

    // First capacity check sees an empty day, every later one sees the row
    // the first booking inserted.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_existing_appointments(
        &mock_server,
        json!([appointment_row(
            "2024-06-03T09:00:00Z",
            "2024-06-03T09:30:00Z",
            "pending"
        )]),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created_row(&request)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = BookingService::with_capacity(&mock_config(&mock_server), 30, 1);

    assert!(service.book_slot(request.clone(), None).await.is_ok());

    let second = service
        .book_slot(booking_request("2024-06-03T09:00:00Z", 30), None)
        .await;
    assert_matches!(second, Err(BookingError::SlotFull));
}

#[tokio::test]
async fn test_caller_token_is_forwarded_to_the_data_plane() {
    let mock_server = MockServer::start().await;
    let request = booking_request("2024-06-03T09:00:00Z", 30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(header("authorization", "Bearer patient-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("authorization", "Bearer patient-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created_row(&request)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = BookingService::with_capacity(&mock_config(&mock_server), 30, 2);
    let result = service.book_slot(request, Some("patient-token")).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_fetch_by_ids_returns_ordered_details() {
    let mock_server = MockServer::start().await;

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_details"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": first,
                "scheduled_at": "2024-06-03T09:00:00Z",
                "status": "confirmed",
                "ovog": "Чулуунбаатар",
                "name": "Бат",
                "book_number": "A-12"
            },
            {
                "id": second,
                "scheduled_at": "2024-06-03T09:15:00Z",
                "status": "pending",
                "ovog": null,
                "name": "Сараа",
                "book_number": null
            }
        ])))
        .mount(&mock_server)
        .await;

    let service = BookingService::new(&mock_config(&mock_server));
    let details = service.fetch_by_ids(&[first, second], None).await.unwrap();

    assert_eq!(details.len(), 2);
    assert_eq!(details[0].patient.cell_label(), "Ч.Бат (A-12)");
    assert_eq!(details[1].patient.cell_label(), "Сараа");
}

#[tokio::test]
async fn test_fetch_by_ids_skips_the_request_for_no_ids() {
    // No mocks mounted: any request would fail the test with a 404 error.
    let mock_server = MockServer::start().await;
    let service = BookingService::new(&mock_config(&mock_server));

    let details = service.fetch_by_ids(&[], None).await.unwrap();
    assert!(details.is_empty());
}

#[tokio::test]
async fn test_gateway_carries_grid_intent_into_a_booking() {
    let mock_server = MockServer::start().await;
    let request = booking_request("2024-06-03T09:00:00Z", 45);

    mount_existing_appointments(&mock_server, json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created_row(&request)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = Arc::new(BookingService::with_capacity(
        &mock_config(&mock_server),
        30,
        2,
    ));
    let gateway = DirectBookingGateway::new(
        service,
        request.doctor_id,
        request.branch_id,
        request.patient_id,
        None,
    );

    let intent = SlotBooking {
        slot_start: instant("2024-06-03T09:00:00Z"),
        duration_minutes: 45,
    };

    assert!(gateway.create_booking(intent).await.is_ok());
}
