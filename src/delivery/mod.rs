//! Delivery pipeline: one fetch-filter-deliver cycle at a time.
//!
//! # Overview
//!
//! Each cycle:
//! 1. Loads the dedup store
//! 2. Fetches the top items of the configured collection
//! 3. Keeps media items in rank order and skips already-sent locators
//! 4. Delivers up to [`MAX_ITEMS_PER_CYCLE`] new items, one at a time
//! 5. Sends a shortfall notice when fewer than the cap were delivered
//!
//! Each item is downloaded into a temp file, attached inline when it is at
//! most [`INLINE_SIZE_LIMIT`] bytes and sent link-only otherwise, recorded in
//! the dedup store on success, and its temp file removed on every path. One
//! failing item never aborts the cycle; a failing source aborts the cycle
//! with an error notice but never the process.

mod constants;
mod outcome;
mod pipeline;

pub use constants::{
    CYCLE_ERROR_NOTICE, DEFAULT_DOWNLOAD_DIR, INLINE_SIZE_LIMIT, MAX_ITEMS_PER_CYCLE,
    shortfall_notice,
};
pub use outcome::{CycleError, CycleReport, DeliveryPath, ItemError, ItemOutcome};
pub use pipeline::{DeliveryPipeline, DeliverySettings};
