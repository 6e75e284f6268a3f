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

use super::id::{self, BookingId, RoomId};
use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

/// Codes of the info items this service reads and writes on Beds24 bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InfoCode {
    /// Set to "Yes" on a master booking once it has been split.
    AutoGroupSplitDone,
    /// Name of the bed (unit) allocated to a child booking.
    AssignedBed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoItem {
    pub code: String,
    #[serde(default, deserialize_with = "de_text")]
    pub text: String,
}

fn de_text<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

impl InfoItem {
    pub fn new(code: InfoCode, text: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            text: text.into(),
        }
    }
}

/// A booking as delivered by a webhook notification or returned by `getBookings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawBooking")]
pub struct Booking {
    pub id: Option<BookingId>,
    /// Booking channel, lowercased when parsed. Empty when unknown.
    pub channel: String,
    pub room_id: Option<RoomId>,
    /// Name of the allocated unit, only present on fetched bookings.
    pub unit_name: Option<String>,
    pub num_adult: u32,
    pub num_child: u32,
    pub num_infant: u32,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub guest_name: Option<String>,
    pub info_items: Vec<InfoItem>,
}

impl Booking {
    pub fn channel_is_airbnb(&self) -> bool {
        self.channel.to_lowercase().contains("airbnb")
    }

    /// Everyone on the booking, infants included.
    pub fn total_guests(&self) -> u32 {
        self.num_adult
            .saturating_add(self.num_child)
            .saturating_add(self.num_infant)
    }

    /// Number of beds the booking occupies. Infants share a bed.
    pub fn bed_count(&self) -> u32 {
        self.num_adult.saturating_add(self.num_child)
    }

    pub fn has_info_code(&self, code: InfoCode) -> bool {
        self.info_items.iter().any(|item| item.code == code.as_ref())
    }

    pub fn info_text(&self, code: InfoCode) -> Option<&str> {
        self.info_items
            .iter()
            .rev()
            .find(|item| item.code == code.as_ref())
            .map(|item| item.text.as_str())
    }
}

/// Wire shape of a booking. Beds24 uses `bookId` or `id`, and `channel` or `source`, depending on
/// where the booking came from.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBooking {
    #[serde(default, deserialize_with = "id::de_opt")]
    book_id: Option<BookingId>,
    #[serde(default, deserialize_with = "id::de_opt")]
    id: Option<BookingId>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default, deserialize_with = "id::de_opt")]
    room_id: Option<RoomId>,
    #[serde(default)]
    unit_name: Option<String>,
    #[serde(default, deserialize_with = "id::de_count")]
    num_adult: u32,
    #[serde(default, deserialize_with = "id::de_count")]
    num_child: u32,
    #[serde(default, deserialize_with = "id::de_count")]
    num_infant: u32,
    #[serde(default)]
    date_from: Option<String>,
    #[serde(default)]
    date_to: Option<String>,
    #[serde(default)]
    guest_name: Option<String>,
    #[serde(default)]
    guest_first_name: Option<String>,
    #[serde(default)]
    info_items: Option<Vec<InfoItem>>,
}

impl From<RawBooking> for Booking {
    fn from(raw: RawBooking) -> Self {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        let channel = non_empty(raw.channel)
            .or_else(|| non_empty(raw.source))
            .unwrap_or_default()
            .to_lowercase();
        Self {
            id: raw.book_id.or(raw.id),
            channel,
            room_id: raw.room_id,
            unit_name: non_empty(raw.unit_name),
            num_adult: raw.num_adult,
            num_child: raw.num_child,
            num_infant: raw.num_infant,
            date_from: raw.date_from.as_deref().and_then(parse_date),
            date_to: raw.date_to.as_deref().and_then(parse_date),
            guest_name: non_empty(raw.guest_name).or_else(|| non_empty(raw.guest_first_name)),
            info_items: raw.info_items.unwrap_or_default(),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BookingStatus {
    #[serde(rename = "1")]
    Confirmed,
}

/// A per-bed child booking to create, in `setBooking` field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub master_id: BookingId,
    pub room_id: RoomId,
    pub num_adult: u32,
    pub num_child: u32,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub guest_name: String,
    pub status: BookingStatus,
    /// Asks Beds24 to allocate a specific unit (bed) to the booking.
    pub assign_booking: bool,
}
