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

use crate::config::server::Dormitory;
use crate::types::booking::{Booking, InfoCode};
use crate::types::id::BookingId;
use serde_json::Value;

/// Why a notification doesn't need splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SkipReason {
    #[strum(serialize = "not an Airbnb booking")]
    NotAirbnb,
    #[strum(serialize = "at most one guest")]
    SingleGuest,
    #[strum(serialize = "not a dormitory room")]
    NotDormitory,
    #[strum(serialize = "already split")]
    AlreadySplit,
}

/// Parses a webhook body into a booking, which may be the body itself or nested under `booking`.
///
/// Returns `None` for anything that doesn't identify a booking, which callers should acknowledge
/// and otherwise ignore.
pub fn parse_notification(body: &[u8]) -> Option<(BookingId, Booking)> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let value = match value {
        Value::Object(mut map) if !map.contains_key("bookId") && !map.contains_key("id") => {
            match map.remove("booking") {
                Some(booking @ Value::Object(_)) => booking,
                _ => Value::Object(map),
            }
        }
        Value::Object(map) => Value::Object(map),
        _ => return None,
    };
    let booking: Booking = serde_json::from_value(value).ok()?;
    Some((booking.id?, booking))
}

/// Checks whether `booking` is an Airbnb booking for several guests in a dormitory room that
/// hasn't been split yet, returning the first reason it isn't.
pub fn skip_reason(booking: &Booking, dormitory: &Dormitory) -> Option<SkipReason> {
    if !booking.channel_is_airbnb() {
        Some(SkipReason::NotAirbnb)
    } else if booking.total_guests() <= 1 {
        Some(SkipReason::SingleGuest)
    } else if !booking
        .room_id
        .map_or(false, |room_id| dormitory.contains(room_id))
    {
        Some(SkipReason::NotDormitory)
    } else if booking.has_info_code(InfoCode::AutoGroupSplitDone) {
        Some(SkipReason::AlreadySplit)
    } else {
        None
    }
}
