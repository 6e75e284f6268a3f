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

mod auth;
mod internal;

pub use auth::Error as AuthError;
pub use internal::Error as InternalError;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, thiserror::Error)]
#[serde(
    tag = "error",
    content = "error_description",
    rename_all = "snake_case"
)]
pub enum ServerError {
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    #[error("remote booking service error: {0}")]
    Remote(String),
}

impl axum::response::IntoResponse for ServerError {
    type Body = axum::body::Full<hyper::body::Bytes>;

    type BodyError = <Self::Body as axum::body::HttpBody>::Error;

    fn into_response(self) -> http::Response<Self::Body> {
        use http::StatusCode;
        let status = match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Remote(_) => StatusCode::BAD_GATEWAY,
        };
        let mut response = axum::Json(self).into_response();
        *response.status_mut() = status;

        response
    }
}

impl From<crate::beds24::Error> for ServerError {
    fn from(e: crate::beds24::Error) -> Self {
        Self::Remote(e.to_string())
    }
}

impl From<crate::split::Error> for ServerError {
    fn from(e: crate::split::Error) -> Self {
        use crate::split::Error;
        match e {
            Error::MissingField(_) | Error::TooManyGuests(_) => Self::Validation(e.to_string()),
            Error::Remote(err) => err.into(),
        }
    }
}
