//! Page text aggregation

use crate::ocr::PageText;

/// Marker written before each page's text
pub fn page_marker(page: usize) -> String {
    format!("--- Page {} ---", page)
}

/// Concatenate page results in page order.
///
/// Input may arrive in any order; output is sorted by page. Callers guarantee
/// pages are exactly `1..=N`.
pub fn aggregate(mut pages: Vec<PageText>) -> String {
    pages.sort_by_key(|p| p.page);
    debug_assert!(
        pages.iter().enumerate().all(|(i, p)| p.page == i + 1),
        "page results must cover 1..=N without gaps or duplicates"
    );

    let capacity = pages.iter().map(|p| p.text.len() + 20).sum();
    let mut out = String::with_capacity(capacity);
    for page in pages {
        out.push_str(&page_marker(page.page));
        out.push('\n');
        out.push_str(&page.text);
        out.push('\n');
    }
    out
}
