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

//! Splitting a multi-guest dormitory booking into one booking per bed.
//!
//! The master booking keeps bed 1. Every further bed becomes a child booking linked to the
//! master, and once all of them exist the master is tagged with `AUTO_GROUP_SPLIT_DONE` so later
//! deliveries of the same webhook leave it alone. Nothing is stored locally: that tag is the only
//! record that a split happened.

use crate::beds24::{self, BookingApi, CreateResult};
use crate::types::booking::{Booking, BookingStatus, InfoCode, NewBooking};
use crate::types::id::BookingId;
use serde::Deserialize;
use serde::Serialize;
use tracing::{info, warn};

/// Text of the completion tag.
pub const DONE: &str = "Yes";

/// Most beds a single booking may be split into.
pub const MAX_BEDS: u32 = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitMode {
    /// Create child bookings one at a time, looking up and tagging the bed allocated to each.
    #[default]
    PerBed,
    /// Create all child bookings in one request, without resolving beds.
    Batch,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("master booking has no {0}")]
    MissingField(&'static str),
    #[error("master booking has {0} beds, more than the {max} it may be split into", max = MAX_BEDS)]
    TooManyGuests(u32),
    #[error(transparent)]
    Remote(#[from] beds24::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bed {
    /// 2 for the first child booking, since the master holds bed 1.
    pub number: u32,
    /// The child booking, if Beds24 reported its id.
    pub booking: Option<BookingId>,
    /// Name of the allocated unit, once recorded on the child booking. Only resolved in
    /// [`SplitMode::PerBed`].
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutcome {
    pub master: BookingId,
    pub beds: Vec<Bed>,
}

/// Name given to the child booking for bed `number`.
pub fn bed_guest_name(main_guest: &str, number: u32) -> String {
    format!("{} - Bed {}", main_guest, number)
}

fn fallback_unit_name(number: u32) -> String {
    format!("Bed {}", number)
}

/// Builds the child bookings for every bed after the first, numbered from 2.
fn child_bookings(master: &Booking) -> Result<Vec<(u32, NewBooking)>, Error> {
    let master_id = master.id.ok_or(Error::MissingField("booking id"))?;
    let room_id = master.room_id.ok_or(Error::MissingField("room id"))?;
    let date_from = master.date_from.ok_or(Error::MissingField("arrival date"))?;
    let date_to = master.date_to.ok_or(Error::MissingField("departure date"))?;
    let main_guest = master.guest_name.as_deref().unwrap_or("Guest");
    if master.bed_count() > MAX_BEDS {
        return Err(Error::TooManyGuests(master.bed_count()));
    }

    Ok((2..=master.bed_count())
        .map(|number| {
            let child = NewBooking {
                master_id,
                room_id,
                num_adult: 1,
                num_child: 0,
                date_from,
                date_to,
                guest_name: bed_guest_name(main_guest, number),
                status: BookingStatus::Confirmed,
                assign_booking: true,
            };
            (number, child)
        })
        .collect())
}

/// Splits `master` into per-bed bookings and marks it as done.
///
/// The master is only tagged once every child booking has been created. If a creation is refused
/// or a request fails, the error is returned with the master untagged, so that a later delivery of
/// the same webhook can try again.
#[tracing::instrument(name = "Split", skip(api, master), fields(book_id = ?master.id), err)]
pub async fn split_group(
    api: &dyn BookingApi,
    mode: SplitMode,
    master: &Booking,
) -> Result<SplitOutcome, Error> {
    let children = child_bookings(master)?;
    let master_id = master.id.ok_or(Error::MissingField("booking id"))?;

    let beds = match mode {
        SplitMode::PerBed => create_per_bed(api, children).await?,
        SplitMode::Batch => create_batch(api, children).await?,
    };

    api.tag_booking(master_id, InfoCode::AutoGroupSplitDone, DONE)
        .await?;
    info!(
        "Split booking {} into {} beds",
        master_id,
        master.bed_count()
    );

    Ok(SplitOutcome {
        master: master_id,
        beds,
    })
}

async fn create_per_bed(
    api: &dyn BookingApi,
    children: Vec<(u32, NewBooking)>,
) -> Result<Vec<Bed>, Error> {
    let mut beds = Vec::with_capacity(children.len());
    for (number, child) in children {
        let result = api
            .create_bookings(std::slice::from_ref(&child))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                beds24::Error::Rejected(format!("no result creating bed {}", number))
            })?;
        check_created(number, &result)?;

        let book_id = match result.book_id {
            Some(book_id) => book_id,
            None => {
                warn!("Bed {} was created but Beds24 didn't say which booking it is", number);
                beds.push(Bed {
                    number,
                    booking: None,
                    unit: None,
                });
                continue;
            }
        };

        let unit = api
            .fetch_booking(book_id)
            .await?
            .and_then(|booking| booking.unit_name)
            .unwrap_or_else(|| fallback_unit_name(number));
        let unit = match api
            .tag_booking(book_id, InfoCode::AssignedBed, &unit)
            .await
        {
            Ok(()) => {
                info!("Guest {} -> {} (booking {})", number, unit, book_id);
                Some(unit)
            }
            Err(beds24::Error::Rejected(message)) => {
                warn!(
                    "Couldn't record bed {} on booking {}: {}",
                    unit, book_id, message
                );
                None
            }
            Err(err) => return Err(err.into()),
        };
        beds.push(Bed {
            number,
            booking: Some(book_id),
            unit,
        });
    }
    Ok(beds)
}

async fn create_batch(
    api: &dyn BookingApi,
    children: Vec<(u32, NewBooking)>,
) -> Result<Vec<Bed>, Error> {
    if children.is_empty() {
        return Ok(vec![]);
    }
    let specs: Vec<NewBooking> = children.iter().map(|(_, child)| child.clone()).collect();
    let results = api.create_bookings(&specs).await?;
    if results.len() != children.len() {
        return Err(beds24::Error::Rejected(format!(
            "asked for {} bookings but got {} results",
            children.len(),
            results.len()
        ))
        .into());
    }

    let mut beds = Vec::with_capacity(children.len());
    for ((number, _), result) in children.iter().zip(results) {
        check_created(*number, &result)?;
        info!("Guest {} -> booking {:?}", number, result.book_id);
        beds.push(Bed {
            number: *number,
            booking: result.book_id,
            unit: None,
        });
    }
    Ok(beds)
}

fn check_created(number: u32, result: &CreateResult) -> Result<(), Error> {
    if result.success {
        Ok(())
    } else {
        Err(beds24::Error::Rejected(format!(
            "creating bed {}: {}",
            number,
            result.message.as_deref().unwrap_or("no reason given")
        ))
        .into())
    }
}
