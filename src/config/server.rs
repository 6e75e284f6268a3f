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

use super::defaults;
use crate::split::SplitMode;
use crate::types::id::RoomId;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Network configuration
    #[serde(default)]
    pub network: Network,
    /// Path to the TLS configuration
    #[serde(default)]
    pub tls: Option<Tls>,
    /// Secret data
    pub secrets: Secrets,
    /// Beds24 API access
    pub beds24: Beds24,
    /// Which rooms are dormitories and how to split bookings for them
    #[serde(default)]
    pub dormitory: Dormitory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Network {
    /// Server address
    #[serde(default = "defaults::server_listen_address")]
    pub address: std::net::IpAddr,
    /// Server port
    #[serde(default = "defaults::server_port")]
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Tls {
    /// Server address
    #[serde(default = "defaults::server_listen_address")]
    pub address: std::net::IpAddr,
    /// Server port
    #[serde(default = "defaults::server_port_tls")]
    pub port: u16,
    /// Path to the TLS certificate
    pub certificate: PathBuf,
    /// Path to the TLS private key
    pub private_key: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Secrets {
    /// Shared secret which Beds24 must send with every webhook, either as the `secret` query
    /// parameter or in the `X-Webhook-Secret` header.
    pub webhook_secret: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Beds24 {
    /// Base URL of the Beds24 JSON API. Must end with a slash.
    #[serde(default = "defaults::beds24_api_url")]
    pub api_url: Url,
    pub api_key: String,
    pub prop_key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Dormitory {
    /// Room ids whose multi-guest bookings get split per bed. Either a list or a single
    /// comma-separated string.
    #[serde(default, deserialize_with = "de_room_ids")]
    pub room_ids: BTreeSet<RoomId>,
    #[serde(default)]
    pub split_mode: SplitMode,
}

impl Dormitory {
    pub fn contains(&self, room_id: RoomId) -> bool {
        self.room_ids.contains(&room_id)
    }
}

impl super::Config for Config {
    const DEFAULT_TOML: &'static str = include_str!("../../default.toml");

    const DEFAULT_FILE: &'static str = "dormsplit.toml";

    fn validate(&self) -> Result<(), String> {
        if self.secrets.webhook_secret.is_empty() {
            return Err("secrets.webhook-secret must not be empty".to_string());
        }
        if self.beds24.api_key.is_empty() {
            return Err("beds24.api-key must not be empty".to_string());
        }
        if self.beds24.prop_key.is_empty() {
            return Err("beds24.prop-key must not be empty".to_string());
        }
        if self.beds24.api_url.cannot_be_a_base() {
            return Err(format!(
                "beds24.api-url {} can't be used as a base URL",
                self.beds24.api_url
            ));
        }

        Ok(())
    }
}

impl Default for Network {
    fn default() -> Self {
        Self {
            address: defaults::server_listen_address(),
            port: defaults::server_port(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoomIds {
    Csv(String),
    List(Vec<RoomIdEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoomIdEntry {
    Number(u64),
    String(String),
}

/// Deserialize room ids, silently dropping entries that aren't plain digits.
fn de_room_ids<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<RoomId>, D::Error> {
    let parse = |s: &str| -> Option<RoomId> {
        let s = s.trim();
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse().ok()
        } else {
            None
        }
    };
    Ok(match RoomIds::deserialize(d)? {
        RoomIds::Csv(s) => s.split(',').filter_map(parse).collect(),
        RoomIds::List(entries) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                RoomIdEntry::Number(n) => Some(RoomId(n)),
                RoomIdEntry::String(s) => parse(&s),
            })
            .collect(),
    })
}
