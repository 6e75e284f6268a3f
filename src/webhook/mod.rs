// Copyright 2024 the dormsplit authors.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

mod filter;

pub use filter::{parse_notification, skip_reason, SkipReason};

use crate::beds24;
use crate::extractors::WebhookSecret;
use crate::split;
use crate::types::booking::InfoCode;
use crate::types::errors::ServerError;
use crate::State;
use axum::extract::Extension;
use axum::Json;
use hyper::body::Bytes;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The notification identified a booking, whether or not it needed splitting.
    Processed,
    /// The notification didn't identify a booking.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub status: Status,
}

impl Acknowledgement {
    fn new(status: Status) -> Json<Self> {
        Json(Self { status })
    }
}

/// Receives a Beds24 booking notification and splits the booking per bed if it needs it.
#[tracing::instrument(name = "Webhook", skip(state, body), err)]
pub async fn handle(
    Extension(state): Extension<State>,
    _secret: WebhookSecret,
    body: Bytes,
) -> Result<Json<Acknowledgement>, ServerError> {
    let (book_id, booking) = match parse_notification(&body) {
        Some(notification) => notification,
        None => {
            tracing::debug!("Ignoring notification without a booking id");
            return Ok(Acknowledgement::new(Status::Ignored));
        }
    };

    if let Some(reason) = skip_reason(&booking, &state.config.dormitory) {
        tracing::info!("Ignoring booking #{}: {}", book_id, reason);
        return Ok(Acknowledgement::new(Status::Processed));
    }

    // The notification may predate our own tag, e.g. when Beds24 redelivers it.
    if let Some(current) = state.beds24.fetch_booking(book_id).await? {
        if current.has_info_code(InfoCode::AutoGroupSplitDone) {
            tracing::info!("Ignoring booking #{}: {}", book_id, SkipReason::AlreadySplit);
            return Ok(Acknowledgement::new(Status::Processed));
        }
    }

    tracing::info!(
        "Detected Airbnb group booking #{} ({} guests), splitting and allocating beds",
        book_id,
        booking.total_guests()
    );
    match split::split_group(
        state.beds24.as_ref(),
        state.config.dormitory.split_mode,
        &booking,
    )
    .await
    {
        Ok(_) => {}
        // Left untagged, so a redelivery of the notification can try again.
        Err(split::Error::Remote(beds24::Error::Rejected(message))) => {
            tracing::warn!("Beds24 refused to split booking #{}: {}", book_id, message);
        }
        Err(err) => return Err(err.into()),
    }

    Ok(Acknowledgement::new(Status::Processed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beds24::fake::{Call, FakeBeds24};
    use crate::config::defaults;
    use crate::config::server::{Beds24, Config, Dormitory, Network, Secrets};
    use crate::split::SplitMode;
    use crate::types::booking::Booking;
    use crate::types::id::{BookingId, RoomId};
    use axum::body::Body;
    use http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "correct-horse";

    fn state(api: Arc<FakeBeds24>, split_mode: SplitMode) -> State {
        State {
            config: Arc::new(Config {
                network: Network::default(),
                tls: None,
                secrets: Secrets {
                    webhook_secret: SECRET.to_string(),
                },
                beds24: Beds24 {
                    api_url: defaults::beds24_api_url(),
                    api_key: "key".to_string(),
                    prop_key: "prop".to_string(),
                },
                dormitory: Dormitory {
                    room_ids: [RoomId(82581), RoomId(82590)].into_iter().collect(),
                    split_mode,
                },
            }),
            beds24: api,
        }
    }

    fn notification() -> Value {
        json!({
            "bookId": 100,
            "channel": "airbnb",
            "roomId": "82581",
            "numAdult": 3,
            "numChild": 0,
            "dateFrom": "2024-07-01",
            "dateTo": "2024-07-04",
            "guestName": "Ana Popescu",
            "infoItems": []
        })
    }

    fn stored_master() -> Booking {
        Booking {
            id: Some(BookingId(100)),
            ..Default::default()
        }
    }

    async fn post(
        state: State,
        uri: &str,
        header: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = header {
            request = request.header("X-Webhook-Secret", secret);
        }
        let request = request.body(Body::from(body.to_string())).unwrap();

        let response = crate::app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn splits_eligible_booking() {
        let api = Arc::new(FakeBeds24::new().with_booking(stored_master()));
        let (status, body) = post(
            state(api.clone(), SplitMode::PerBed),
            "/beds24-webhook?secret=correct-horse",
            None,
            notification(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "processed"}));
        let names: Vec<String> = api.created().into_iter().map(|c| c.guest_name).collect();
        assert_eq!(names, vec!["Ana Popescu - Bed 2", "Ana Popescu - Bed 3"]);
        assert_eq!(api.calls()[0], Call::Fetch(BookingId(100)));
        assert_eq!(
            api.booking(BookingId(100))
                .unwrap()
                .info_text(InfoCode::AutoGroupSplitDone),
            Some("Yes")
        );
    }

    #[tokio::test]
    async fn secret_in_header() {
        let api = Arc::new(FakeBeds24::new().with_booking(stored_master()));
        let (status, _) = post(
            state(api.clone(), SplitMode::Batch),
            "/beds24-webhook",
            Some(SECRET),
            notification(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(api.created().len(), 2);
    }

    #[tokio::test]
    async fn wrong_or_missing_secret() {
        for (uri, header) in [
            ("/beds24-webhook?secret=wrong", None),
            ("/beds24-webhook", Some("wrong")),
            ("/beds24-webhook", None),
            ("/beds24-webhook?secret=", None),
            ("/beds24-webhook?secret=correct-horse-battery", None),
        ] {
            let api = Arc::new(FakeBeds24::new().with_booking(stored_master()));
            let (status, body) =
                post(state(api.clone(), SplitMode::PerBed), uri, header, notification()).await;

            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {:?}", uri, header);
            assert_eq!(body["error"], "auth");
            assert!(api.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn notification_without_id_is_ignored() {
        for body in [json!({"roomId": 82581}), json!({"booking": {}}), json!([])] {
            let api = Arc::new(FakeBeds24::new());
            let (status, reply) = post(
                state(api.clone(), SplitMode::PerBed),
                "/beds24-webhook?secret=correct-horse",
                None,
                body,
            )
            .await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(reply, json!({"status": "ignored"}));
            assert!(api.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn nested_booking() {
        let api = Arc::new(FakeBeds24::new().with_booking(stored_master()));
        let (status, _) = post(
            state(api.clone(), SplitMode::PerBed),
            "/beds24-webhook?secret=correct-horse",
            None,
            json!({ "booking": notification() }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(api.created().len(), 2);
    }

    #[tokio::test]
    async fn ineligible_bookings_make_no_calls() {
        let mut not_airbnb = notification();
        not_airbnb["channel"] = json!("booking.com");
        let mut single = notification();
        single["numAdult"] = json!(1);
        let mut other_room = notification();
        other_room["roomId"] = json!(12);
        let mut done = notification();
        done["infoItems"] = json!([{"code": "AUTO_GROUP_SPLIT_DONE", "text": "Yes"}]);

        for body in [not_airbnb, single, other_room, done] {
            let api = Arc::new(FakeBeds24::new().with_booking(stored_master()));
            let (status, reply) = post(
                state(api.clone(), SplitMode::PerBed),
                "/beds24-webhook?secret=correct-horse",
                None,
                body,
            )
            .await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(reply, json!({"status": "processed"}));
            assert!(api.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn duplicate_delivery_after_split() {
        let api = Arc::new(FakeBeds24::new().with_booking(stored_master()));
        for _ in 0..2 {
            let (status, _) = post(
                state(api.clone(), SplitMode::PerBed),
                "/beds24-webhook?secret=correct-horse",
                None,
                notification(),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        // The second delivery still carries the stale info items, so only the remote tag stops it.
        assert_eq!(api.created().len(), 2);
        assert_eq!(api.calls().last(), Some(&Call::Fetch(BookingId(100))));
    }

    #[tokio::test]
    async fn refused_split_is_acknowledged_and_left_untagged() {
        let api = Arc::new(
            FakeBeds24::new()
                .with_booking(stored_master())
                .accept_creations(0),
        );
        let (status, body) = post(
            state(api.clone(), SplitMode::PerBed),
            "/beds24-webhook?secret=correct-horse",
            None,
            notification(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "processed"}));
        assert_eq!(api.created().len(), 1);
        assert!(!api
            .booking(BookingId(100))
            .unwrap()
            .has_info_code(InfoCode::AutoGroupSplitDone));
    }

    #[tokio::test]
    async fn failed_bed_lookup_fails_loudly() {
        let api = Arc::new(
            FakeBeds24::new()
                .with_booking(stored_master())
                .fail_fetches_on(BookingId(900_001)),
        );
        let (status, body) = post(
            state(api.clone(), SplitMode::PerBed),
            "/beds24-webhook?secret=correct-horse",
            None,
            notification(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "remote");
        assert!(api.tags().is_empty());
        assert!(!api
            .booking(BookingId(100))
            .unwrap()
            .has_info_code(InfoCode::AutoGroupSplitDone));
    }

    #[tokio::test]
    async fn failed_master_lookup_creates_nothing() {
        let api = Arc::new(
            FakeBeds24::new()
                .with_booking(stored_master())
                .fail_fetches_on(BookingId(100)),
        );
        let (status, _) = post(
            state(api.clone(), SplitMode::PerBed),
            "/beds24-webhook?secret=correct-horse",
            None,
            notification(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(api.calls(), vec![Call::Fetch(BookingId(100))]);
    }

    #[tokio::test]
    async fn implausible_guest_count_is_rejected() {
        let api = Arc::new(FakeBeds24::new().with_booking(stored_master()));
        let mut body = notification();
        body["numAdult"] = json!("4294967295");
        let (status, reply) = post(
            state(api.clone(), SplitMode::PerBed),
            "/beds24-webhook?secret=correct-horse",
            None,
            body,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["error"], "validation");
        assert!(api.created().is_empty());
    }

    #[tokio::test]
    async fn master_without_dates_is_rejected() {
        let api = Arc::new(FakeBeds24::new().with_booking(stored_master()));
        let mut body = notification();
        body.as_object_mut().unwrap().remove("dateFrom");
        let (status, reply) = post(
            state(api.clone(), SplitMode::PerBed),
            "/beds24-webhook?secret=correct-horse",
            None,
            body,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["error"], "validation");
        assert!(api.created().is_empty());
    }

    #[tokio::test]
    async fn health_check() {
        let api = Arc::new(FakeBeds24::new());
        let request = Request::builder()
            .uri("/health_check")
            .body(Body::empty())
            .unwrap();
        let response = crate::app(state(api, SplitMode::PerBed))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn acknowledgement_shape() {
        assert_eq!(
            serde_json::to_value(Acknowledgement {
                status: Status::Ignored
            })
            .unwrap(),
            json!({"status": "ignored"})
        );
    }
}
