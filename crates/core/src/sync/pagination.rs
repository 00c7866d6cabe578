//! Page arithmetic for the asset query

/// Number of pages needed to hold `count` items at `page_size` per page.
///
/// Returns `None` when the server reports items but a zero page size, or
/// when the page count does not fit in a `u32`.
pub fn total_pages(count: u64, page_size: u32) -> Option<u32> {
    if page_size == 0 {
        return (count == 0).then_some(0);
    }
    u32::try_from(count.div_ceil(u64::from(page_size))).ok()
}

/// Pages still to fetch after the first one.
pub fn remaining_pages(total_pages: u32) -> std::ops::RangeInclusive<u32> {
    2..=total_pages
}
