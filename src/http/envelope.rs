//! Success-side response envelope. The error side lives in `AppError::IntoResponse`;
//! this is its `{ "ok": true, "data": ... }` counterpart.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    ok: bool,
    data: T,
}

pub struct Ok200<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Ok200<T> {
    fn into_response(self) -> Response {
        Json(Envelope { ok: true, data: self.0 }).into_response()
    }
}

pub struct Created<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(Envelope { ok: true, data: self.0 })).into_response()
    }
}
