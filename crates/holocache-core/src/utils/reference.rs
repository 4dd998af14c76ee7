/// Extract the uid from a reference url: the trailing numeric path segment,
/// tolerating one optional trailing slash.
///
/// `https://www.swapi.tech/api/planets/1` and `.../planets/1/` both yield `"1"`.
/// Anything else (no slash before the segment, non-digits, empty) yields `None`.
pub fn extract_uid(url: &str) -> Option<&str> {
    let trimmed = url.strip_suffix('/').unwrap_or(url);
    let (_, segment) = trimmed.rsplit_once('/')?;
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        Some(segment)
    } else {
        None
    }
}
