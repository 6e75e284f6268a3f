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

//! Client for the Beds24 JSON API.
//!
//! Only the three calls this service needs are covered: fetching one booking, creating bookings
//! and setting info items on an existing booking. Every call is a POST carrying an
//! `authentication` block; Beds24 reports business errors in the body with a 200 status, so replies
//! are interpreted here rather than by HTTP status alone.

#[cfg(test)]
pub mod fake;

use crate::config::server::Beds24;
use crate::types::booking::{Booking, InfoCode, InfoItem, NewBooking};
use crate::types::id::BookingId;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

const USER_AGENT: &str = concat!("dormsplit/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("building request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("undecodable reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("rejected by Beds24: {0}")]
    Rejected(String),
}

/// Outcome of creating one booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResult {
    pub success: bool,
    /// Id of the new booking, if Beds24 told us.
    pub book_id: Option<BookingId>,
    /// Error or status message from Beds24.
    pub message: Option<String>,
}

/// Operations on the remote booking service.
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// Fetches a booking together with its info items, or `None` if Beds24 has no such booking.
    async fn fetch_booking(&self, id: BookingId) -> Result<Option<Booking>, Error>;

    /// Creates bookings in a single request, returning one result per booking Beds24 reported on.
    async fn create_bookings(&self, bookings: &[NewBooking]) -> Result<Vec<CreateResult>, Error>;

    /// Sets the info item `code` on a booking, replacing any existing text.
    async fn tag_booking(&self, id: BookingId, code: InfoCode, text: &str) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct Authentication<'a> {
    api_key: &'a str,
    prop_key: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetBookingsRequest<'a> {
    authentication: Authentication<'a>,
    book_id: BookingId,
    include_info_items: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetInfoItemsRequest<'a> {
    authentication: Authentication<'a>,
    book_id: BookingId,
    info_items: Vec<InfoItem>,
}

#[derive(Debug, Serialize)]
struct CreateBookingsRequest<'a> {
    authentication: Authentication<'a>,
    array: &'a [NewBooking],
}

#[derive(Clone, Debug)]
pub struct Beds24Client {
    http: reqwest::Client,
    api_url: Url,
    api_key: String,
    prop_key: String,
}

impl Beds24Client {
    pub fn new(config: &Beds24) -> Result<Self, Error> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            prop_key: config.prop_key.clone(),
        })
    }

    fn authentication(&self) -> Authentication<'_> {
        Authentication {
            api_key: &self.api_key,
            prop_key: &self.prop_key,
        }
    }

    async fn post(&self, method: &str, body: &impl Serialize) -> Result<Value, Error> {
        let url = self.api_url.join(method)?;
        tracing::debug!("POST {}", url);
        let reply = self
            .http
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(serde_json::from_slice(&reply)?)
    }
}

#[async_trait]
impl BookingApi for Beds24Client {
    #[tracing::instrument(name = "GetBooking", skip(self), err)]
    async fn fetch_booking(&self, id: BookingId) -> Result<Option<Booking>, Error> {
        let request = GetBookingsRequest {
            authentication: self.authentication(),
            book_id: id,
            include_info_items: true,
        };
        fetch_reply(self.post("getBookings", &request).await?)
    }

    #[tracing::instrument(name = "CreateBookings", skip(self, bookings), fields(count = bookings.len()), err)]
    async fn create_bookings(&self, bookings: &[NewBooking]) -> Result<Vec<CreateResult>, Error> {
        let request = CreateBookingsRequest {
            authentication: self.authentication(),
            array: bookings,
        };
        create_reply(self.post("setBooking", &request).await?)
    }

    #[tracing::instrument(name = "SetInfoItem", skip(self), err)]
    async fn tag_booking(&self, id: BookingId, code: InfoCode, text: &str) -> Result<(), Error> {
        let request = SetInfoItemsRequest {
            authentication: self.authentication(),
            book_id: id,
            info_items: vec![InfoItem::new(code, text)],
        };
        let result = first_result(self.post("setBooking", &request).await?)?;
        if result.success {
            Ok(())
        } else {
            Err(Error::Rejected(
                result
                    .message
                    .unwrap_or_else(|| format!("setting {} on booking {}", code, id)),
            ))
        }
    }
}

/// `getBookings` answers with a bare array, or with `{"bookings": [...]}` from some endpoints.
fn fetch_reply(reply: Value) -> Result<Option<Booking>, Error> {
    let bookings = match reply {
        Value::Array(bookings) => bookings,
        Value::Object(mut map) => {
            if let Some(message) = rejection(&map) {
                return Err(Error::Rejected(message));
            }
            match map.remove("bookings") {
                Some(Value::Array(bookings)) => bookings,
                _ => vec![],
            }
        }
        _ => vec![],
    };
    Ok(bookings
        .into_iter()
        .find(|booking| !booking.is_null())
        .map(serde_json::from_value)
        .transpose()?)
}

/// `setBooking` answers with one object per booking when given an `array`, or a single object
/// otherwise.
fn create_reply(reply: Value) -> Result<Vec<CreateResult>, Error> {
    match reply {
        Value::Array(results) => Ok(results
            .into_iter()
            .map(|result| match result {
                Value::Object(map) => create_result(&map),
                other => CreateResult {
                    success: false,
                    book_id: None,
                    message: Some(format!("unexpected result {}", other)),
                },
            })
            .collect()),
        Value::Object(map) => Ok(vec![create_result(&map)]),
        other => Err(Error::Rejected(format!("unexpected reply {}", other))),
    }
}

fn first_result(reply: Value) -> Result<CreateResult, Error> {
    create_reply(reply)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Rejected("empty reply".to_string()))
}

fn create_result(map: &Map<String, Value>) -> CreateResult {
    let book_id = map.get("bookId").and_then(loose_id).or_else(|| {
        map.get("bookings")
            .and_then(|bookings| bookings.get(0))
            .and_then(|booking| booking.get("bookId"))
            .and_then(loose_id)
    });
    if let Some(message) = rejection(map) {
        return CreateResult {
            success: false,
            book_id,
            message: Some(message),
        };
    }
    let (success, message) = match map.get("success") {
        // Without an explicit verdict, only a reported booking counts as done.
        None | Some(Value::Null) => (book_id.is_some(), None),
        Some(Value::Bool(success)) => (*success, None),
        Some(Value::String(message)) => (
            !message.is_empty() && !message.eq_ignore_ascii_case("false"),
            Some(message.clone()),
        ),
        Some(Value::Number(n)) => (n.as_u64() != Some(0), None),
        Some(other) => (false, Some(other.to_string())),
    };
    CreateResult {
        success,
        book_id,
        message,
    }
}

fn rejection(map: &Map<String, Value>) -> Option<String> {
    let message = match map.get("error")? {
        Value::Null | Value::Bool(false) => return None,
        Value::String(message) => message.clone(),
        other => other.to_string(),
    };
    Some(match map.get("errorCode") {
        Some(Value::String(code)) => format!("{} (code {})", message, code),
        Some(Value::Number(code)) => format!("{} (code {})", message, code),
        _ => message,
    })
}

fn loose_id(value: &Value) -> Option<BookingId> {
    match value {
        Value::Number(n) => n.as_u64().map(BookingId),
        Value::String(s) => s.trim().parse().ok().map(BookingId),
        _ => None,
    }
}
