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

use dormsplit::beds24::Beds24Client;
use dormsplit::config::server::Config;
use dormsplit::config::Config as _;
use dormsplit::config::Error as ConfigError;
use std::env;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::select;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    const HIDE_TIMESTAMP_ENV: &str = "DORMSPLIT_HIDE_TIMESTAMP";

    dormsplit::config::init_logging(env::var_os(HIDE_TIMESTAMP_ENV).is_some());
    let config_path = match env::var("DORMSPLIT_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => Config::default_path()?,
    };

    debug!("Config path: {:?}", config_path);

    let config = match Config::read(&config_path) {
        Ok(config) => config,
        Err(ConfigError::IO(err)) if err.kind() == io::ErrorKind::NotFound => {
            error!("Config file could not be found at {:?}", config_path);
            return Ok(());
        }
        Err(err) => {
            error!("Config error: {}", err);
            return Err(err.into());
        }
    };
    if config.dormitory.room_ids.is_empty() {
        warn!("No dormitory rooms configured, no booking will be split");
    } else {
        info!(
            "Splitting Airbnb group bookings for rooms {:?} ({:?})",
            config.dormitory.room_ids, config.dormitory.split_mode
        );
    }

    let beds24 = Beds24Client::new(&config.beds24)?;
    let state = dormsplit::State {
        config: Arc::new(config),
        beds24: Arc::new(beds24),
    };

    let address = SocketAddr::new(state.config.network.address, state.config.network.port);

    let fut = axum_server::bind(address).serve(dormsplit::app(state.clone()).into_make_service());
    info!("Starting server at {}", address);
    if let Some(tls) = &state.config.tls {
        let tls_address = SocketAddr::new(tls.address, tls.port);
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            &tls.certificate,
            &tls.private_key,
        )
        .await?;
        let tls_fut = axum_server::bind_rustls(tls_address, tls_config)
            .serve(dormsplit::app(state).into_make_service());
        info!("Starting TLS server at {}", tls_address);

        select! {
            val = fut => val?,
            val = tls_fut => val?
        };
    } else {
        fut.await?;
    }

    Ok(())
}
