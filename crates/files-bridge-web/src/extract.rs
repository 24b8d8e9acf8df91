//! Request extractors that report failures through `BridgeError`.

use axum::extract::FromRequest;

use crate::error::BridgeError;

/// `axum::Json` whose rejection renders as a `{error}` body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(BridgeError))]
pub struct JsonBody<T>(pub T);
