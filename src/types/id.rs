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

//! Identifiers as they appear in Beds24 payloads.
//!
//! Beds24 is inconsistent about whether ids and counts are sent as JSON numbers or as strings, so
//! everything is normalised to `u64` at the boundary and compared as such from then on.

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BookingId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for BookingId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<u64> for RoomId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for BookingId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        de_strict(d).map(Self)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        de_strict(d).map(Self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(u64),
    String(String),
    Other(IgnoredAny),
}

impl Loose {
    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
            Self::Other(_) => None,
        }
    }
}

fn de_strict<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Loose::deserialize(d)?
        .as_u64()
        .ok_or_else(|| serde::de::Error::custom("expected a non-negative integer or numeric string"))
}

/// Deserialize an optional number or numeric string, mapping anything unusable to `None`.
pub fn de_opt<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<u64>,
{
    Ok(Option::<Loose>::deserialize(d)?
        .and_then(|loose| loose.as_u64())
        .map(T::from))
}

/// Deserialize a guest count, treating missing or malformed values as zero.
pub fn de_count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?
        .and_then(|loose| loose.as_u64())
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0))
}
