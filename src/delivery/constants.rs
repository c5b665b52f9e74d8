//! Constants for the delivery pipeline (cycle cap, size threshold, notice text).

/// Maximum number of items delivered per cycle.
pub const MAX_ITEMS_PER_CYCLE: usize = 50;

/// Largest payload attached inline (8 MiB). Larger payloads go link-only.
///
/// The boundary is inclusive: a payload of exactly this size is attached.
pub const INLINE_SIZE_LIMIT: u64 = 8 * 1024 * 1024;

/// Default temp directory for payload downloads.
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloaded_images";

/// Notice sent when a cycle fails before delivering anything.
pub const CYCLE_ERROR_NOTICE: &str = "An error occurred while fetching the posts.";

/// Notice sent when fewer than `cap` items were delivered.
#[must_use]
pub fn shortfall_notice(collection: &str, delivered: usize, cap: usize) -> String {
    format!(
        "Found less than {cap} unique image posts in r/{collection} ({delivered} of {cap} delivered)."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_limit_is_eight_mebibytes() {
        assert_eq!(INLINE_SIZE_LIMIT, 8_388_608);
    }

    #[test]
    fn test_shortfall_notice_cites_counts() {
        assert_eq!(
            shortfall_notice("pics", 12, 50),
            "Found less than 50 unique image posts in r/pics (12 of 50 delivered)."
        );
    }
}
