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

//! In-memory stand-in for Beds24, recording every call made to it.

use super::{BookingApi, CreateResult, Error};
use crate::types::booking::{Booking, InfoCode, InfoItem, NewBooking};
use crate::types::id::BookingId;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

const FIRST_CREATED_ID: u64 = 900_001;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch(BookingId),
    Create(Vec<NewBooking>),
    Tag(BookingId, String, String),
}

#[derive(Debug, Default)]
struct Inner {
    bookings: BTreeMap<BookingId, Booking>,
    calls: Vec<Call>,
    created: u64,
    /// Creations beyond this many are rejected.
    accept_creations: Option<u64>,
    reject_tags_on: Vec<BookingId>,
    fail_fetches_on: Vec<BookingId>,
    omit_unit_names: bool,
}

#[derive(Debug, Default)]
pub struct FakeBeds24 {
    inner: Mutex<Inner>,
}

impl FakeBeds24 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_booking(self, booking: Booking) -> Self {
        let id = booking.id.expect("stored bookings need an id");
        self.lock().bookings.insert(id, booking);
        self
    }

    /// Accept only the first `n` booking creations, rejecting the rest for lack of availability.
    pub fn accept_creations(self, n: u64) -> Self {
        self.lock().accept_creations = Some(n);
        self
    }

    pub fn reject_tags_on(self, id: BookingId) -> Self {
        self.lock().reject_tags_on.push(id);
        self
    }

    /// Answer fetches of `id` with a garbled reply.
    pub fn fail_fetches_on(self, id: BookingId) -> Self {
        self.lock().fail_fetches_on.push(id);
        self
    }

    /// Don't allocate unit names to created bookings.
    pub fn without_unit_names(self) -> Self {
        self.lock().omit_unit_names = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn created(&self) -> Vec<NewBooking> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(bookings) => Some(bookings),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn tags(&self) -> Vec<(BookingId, String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Tag(id, code, text) => Some((id, code, text)),
                _ => None,
            })
            .collect()
    }

    pub fn booking(&self, id: BookingId) -> Option<Booking> {
        self.lock().bookings.get(&id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }
}

fn garbled_reply() -> Error {
    Error::Decode(serde_json::from_str::<serde_json::Value>("{\"book").unwrap_err())
}

#[async_trait]
impl BookingApi for FakeBeds24 {
    async fn fetch_booking(&self, id: BookingId) -> Result<Option<Booking>, Error> {
        let mut inner = self.lock();
        inner.calls.push(Call::Fetch(id));
        if inner.fail_fetches_on.contains(&id) {
            return Err(garbled_reply());
        }
        Ok(inner.bookings.get(&id).cloned())
    }

    async fn create_bookings(&self, bookings: &[NewBooking]) -> Result<Vec<CreateResult>, Error> {
        let mut inner = self.lock();
        inner.calls.push(Call::Create(bookings.to_vec()));
        let mut results = vec![];
        for new in bookings {
            if inner.accept_creations.map_or(false, |n| inner.created >= n) {
                results.push(CreateResult {
                    success: false,
                    book_id: None,
                    message: Some("no availability".to_string()),
                });
                continue;
            }
            let id = BookingId(FIRST_CREATED_ID + inner.created);
            inner.created += 1;
            let unit_name = if inner.omit_unit_names {
                None
            } else {
                Some(format!("Dorm bed {}", inner.created))
            };
            inner.bookings.insert(
                id,
                Booking {
                    id: Some(id),
                    room_id: Some(new.room_id),
                    unit_name,
                    num_adult: new.num_adult,
                    num_child: new.num_child,
                    date_from: Some(new.date_from),
                    date_to: Some(new.date_to),
                    guest_name: Some(new.guest_name.clone()),
                    ..Default::default()
                },
            );
            results.push(CreateResult {
                success: true,
                book_id: Some(id),
                message: None,
            });
        }
        Ok(results)
    }

    async fn tag_booking(&self, id: BookingId, code: InfoCode, text: &str) -> Result<(), Error> {
        let mut inner = self.lock();
        inner
            .calls
            .push(Call::Tag(id, code.to_string(), text.to_string()));
        if inner.reject_tags_on.contains(&id) {
            return Err(Error::Rejected("modification refused".to_string()));
        }
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or_else(|| Error::Rejected(format!("no booking {}", id)))?;
        booking
            .info_items
            .retain(|item| item.code != code.as_ref());
        booking.info_items.push(InfoItem::new(code, text));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tag_then_fetch_round_trip() {
        let api = FakeBeds24::new().with_booking(Booking {
            id: Some(BookingId(1)),
            ..Default::default()
        });
        api.tag_booking(BookingId(1), InfoCode::AssignedBed, "Bed 4")
            .await
            .unwrap();
        api.tag_booking(BookingId(1), InfoCode::AssignedBed, "Bed 5")
            .await
            .unwrap();

        let booking = api.fetch_booking(BookingId(1)).await.unwrap().unwrap();
        assert_eq!(booking.info_items.len(), 1);
        assert_eq!(booking.info_text(InfoCode::AssignedBed), Some("Bed 5"));
    }

    #[tokio::test]
    async fn tagging_unknown_booking_fails() {
        let api = FakeBeds24::new();
        assert!(api
            .tag_booking(BookingId(2), InfoCode::AssignedBed, "Bed 1")
            .await
            .is_err());
        assert_eq!(api.fetch_booking(BookingId(2)).await.unwrap(), None);
    }
}
