//! Payload downloads into scoped temp files.
//!
//! [`PayloadClient::fetch`] streams a locator's bytes into the download
//! directory and hands back a [`TempPayload`]. Dropping the `TempPayload`
//! deletes the file, so the directory never accumulates payloads across
//! items or cycles.

mod client;
mod error;
mod filename;

pub use client::{PayloadClient, TempPayload};
pub use error::PayloadError;
