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

use crate::types::errors::AuthError;
use crate::types::errors::InternalError;
use crate::types::errors::ServerError;
use crate::State;
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::RequestParts;

pub const SECRET_HEADER: &str = "x-webhook-secret";
const SECRET_QUERY_PARAMETER: &str = "secret";

/// Proof that the request carried the configured webhook secret.
///
/// The secret is taken from the `secret` query parameter, or failing that from the
/// `X-Webhook-Secret` header.
#[derive(Debug)]
pub struct WebhookSecret;

#[async_trait]
impl axum::extract::FromRequest<Body> for WebhookSecret {
    type Rejection = ServerError;

    async fn from_request(req: &mut RequestParts<Body>) -> Result<Self, Self::Rejection> {
        let state: &State = req
            .extensions()
            .and_then(|extensions| extensions.get::<State>())
            .ok_or(InternalError::MissingState)?;
        let expected = state.config.secrets.webhook_secret.as_str();

        match supplied_secret(req) {
            None => Err(AuthError::MissingSecret.into()),
            Some(secret) if secret == expected => Ok(Self),
            Some(_) => Err(AuthError::InvalidSecret.into()),
        }
    }
}

fn supplied_secret(req: &RequestParts<Body>) -> Option<String> {
    let from_query = req.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == SECRET_QUERY_PARAMETER)
            .map(|(_, value)| value.into_owned())
    });
    from_query.filter(|secret| !secret.is_empty()).or_else(|| {
        req.headers()?
            .get(SECRET_HEADER)?
            .to_str()
            .ok()
            .map(str::to_owned)
    })
}
