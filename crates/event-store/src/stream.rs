//! Stream and category naming.
//!
//! Entity streams are named `<Category>-<id>`. The category stream of a
//! category is the virtual stream `$ce-<Category>`, which interleaves the
//! events of every entity stream in that category in log order.

/// Prefix of category stream names.
pub const CATEGORY_PREFIX: &str = "$ce-";

/// Returns the category of an entity stream, i.e. everything before the first `-`.
///
/// Streams without a separator are their own category.
pub fn category_of(stream_id: &str) -> &str {
    match stream_id.split_once('-') {
        Some((category, _)) => category,
        None => stream_id,
    }
}

/// Returns the category stream name for a category.
pub fn category_stream(category: &str) -> String {
    format!("{CATEGORY_PREFIX}{category}")
}

/// Returns the category addressed by a `$ce-` stream name, if it is one.
pub fn parse_category_stream(stream_id: &str) -> Option<&str> {
    stream_id.strip_prefix(CATEGORY_PREFIX)
}

/// Builds an entity stream name from a category and an identifier.
///
/// The identifier must not contain `-`, or [`category_of`] would split inside it.
pub fn entity_stream(category: &str, id: &str) -> String {
    format!("{category}-{id}")
}
