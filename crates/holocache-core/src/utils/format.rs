/// Percentage of `done` over `total`, rounded to the nearest whole number and
/// capped at 100. Unknown or zero totals have no percentage.
pub fn percent(done: usize, total: Option<usize>) -> Option<u8> {
    match total {
        Some(total) if total > 0 => {
            let pct = ((done as f64 / total as f64) * 100.0).round();
            Some(pct.min(100.0) as u8)
        }
        _ => None,
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
