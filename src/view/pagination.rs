use std::fmt;
use std::ops::RangeInclusive;

use crate::api::PaginationSummary;

pub const DEFAULT_MAX_VISIBLE: u32 = 5;
/// Upper bound for a configured page-strip width
pub const MAX_VISIBLE_LIMIT: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationRejection {
    AlreadyFirstPage,
    AlreadyLastPage { last: u32 },
}

impl fmt::Display for NavigationRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationRejection::AlreadyFirstPage => write!(f, "Already on the first page"),
            NavigationRejection::AlreadyLastPage { last } => {
                write!(f, "Already on the last page ({})", last)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Navigate(u32),
    Rejected(NavigationRejection),
}

/// One entry of the page strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page { number: u32, current: bool },
    Ellipsis,
}

/// The rendered page strip: numbered buttons with ellipses, plus the state
/// of the previous/next buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStrip {
    pub items: Vec<PageItem>,
    pub window: RangeInclusive<u32>,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageStrip {
    pub fn page_numbers(&self) -> Vec<u32> {
        self.items
            .iter()
            .filter_map(|item| match item {
                PageItem::Page { number, .. } => Some(*number),
                PageItem::Ellipsis => None,
            })
            .collect()
    }
}

/// Navigation rules over the latest server-reported pagination summary.
/// Stateless: every answer is a function of the summary passed in.
#[derive(Debug, Clone, Copy)]
pub struct PaginationController {
    max_visible: u32,
}

impl Default for PaginationController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VISIBLE)
    }
}

impl PaginationController {
    pub fn new(max_visible: u32) -> Self {
        Self {
            max_visible: max_visible.max(1),
        }
    }

    /// Step one page back (`-1`) or forward (`+1`). `None` when nothing has
    /// been loaded yet. Out-of-range targets are rejected, never clamped.
    pub fn navigate(
        &self,
        direction: i32,
        current: Option<&PaginationSummary>,
    ) -> Option<NavigationOutcome> {
        let current = current?;
        let target = i64::from(current.page) + i64::from(direction);
        Some(Self::check(target, current))
    }

    /// Validate a direct jump (page-strip click, "go to page" input)
    pub fn validate_jump(&self, page: u32, current: &PaginationSummary) -> NavigationOutcome {
        Self::check(i64::from(page), current)
    }

    fn check(target: i64, current: &PaginationSummary) -> NavigationOutcome {
        let last = current.last_page();
        if target < 1 {
            NavigationOutcome::Rejected(NavigationRejection::AlreadyFirstPage)
        } else if target > i64::from(last) {
            NavigationOutcome::Rejected(NavigationRejection::AlreadyLastPage { last })
        } else {
            NavigationOutcome::Navigate(target as u32)
        }
    }

    /// Contiguous window of `min(max_visible, total_pages)` pages around the
    /// current page, never starting before 1 or ending after the last page
    pub fn window(&self, current: &PaginationSummary) -> RangeInclusive<u32> {
        let total_pages = current.last_page();
        let page = current.page.clamp(1, total_pages);
        let max_visible = self.max_visible;

        let mut start = page.saturating_sub(max_visible / 2).max(1);
        let end = total_pages.min(start.saturating_add(max_visible - 1));
        if (end - start).saturating_add(1) < max_visible {
            start = end - (max_visible - 1).min(end - 1);
        }
        start..=end
    }

    pub fn visible_window(&self, current: &PaginationSummary) -> PageStrip {
        let total_pages = current.last_page();
        let window = self.window(current);
        let (start, end) = (*window.start(), *window.end());
        let page_item = |number: u32| PageItem::Page {
            number,
            current: number == current.page,
        };

        let mut items = Vec::new();
        if start > 1 {
            items.push(page_item(1));
            if start > 2 {
                items.push(PageItem::Ellipsis);
            }
        }
        items.extend(window.clone().map(page_item));
        if end < total_pages {
            if end < total_pages - 1 {
                items.push(PageItem::Ellipsis);
            }
            items.push(page_item(total_pages));
        }

        PageStrip {
            items,
            window,
            has_previous: current.page > 1,
            has_next: current.page < total_pages,
        }
    }

    /// `(first row, last row, total)` of the current page, 1-based.
    /// An empty result yields `(0, 0, 0)` from the same formula.
    pub fn range_label(current: &PaginationSummary) -> (u64, u64, u64) {
        let page = u64::from(current.page.max(1));
        let per_page = u64::from(current.per_page);
        let start = ((page - 1) * per_page + 1).min(current.total);
        let end = (page * per_page).min(current.total);
        (start, end, current.total)
    }

    pub fn range_text(current: &PaginationSummary) -> String {
        let (start, end, total) = Self::range_label(current);
        format!(
            "Showing {}-{} of {} rows",
            group_digits(start),
            group_digits(end),
            group_digits(total)
        )
    }
}

/// `1234567` -> `1,234,567`
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
