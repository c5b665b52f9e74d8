//! Selection of media-bearing candidates.

use crate::source::ContentItem;

/// Locator suffixes recognized as directly downloadable images.
///
/// Matching is case-sensitive on the end of the locator, so query strings
/// or fragments disqualify an item.
pub const MEDIA_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Returns true if `item` links straight to a media file and is not a self post.
#[must_use]
pub fn is_eligible(item: &ContentItem) -> bool {
    !item.is_self_post
        && MEDIA_EXTENSIONS
            .iter()
            .any(|ext| item.locator.ends_with(ext))
}

/// Keeps only eligible items, preserving the source's ranking order.
#[must_use]
pub fn filter_eligible(items: Vec<ContentItem>) -> Vec<ContentItem> {
    items.into_iter().filter(is_eligible).collect()
}
