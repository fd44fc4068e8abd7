use dbview::api::PaginationSummary;
use dbview::view::{NavigationOutcome, NavigationRejection, PageItem, PaginationController};
use proptest::prelude::*;

fn summary(page: u32, total_pages: u32, per_page: u32) -> PaginationSummary {
    PaginationSummary {
        page,
        per_page,
        total: u64::from(total_pages) * u64::from(per_page),
        total_pages,
        filtered: None,
    }
}

fn arb_summary() -> impl Strategy<Value = PaginationSummary> {
    (1u32..2_000, 1u32..500).prop_flat_map(|(total_pages, per_page)| {
        (1..=total_pages).prop_map(move |page| summary(page, total_pages, per_page))
    })
}

proptest! {
    #[test]
    fn prop_window_is_bounded_and_contains_page(
        current in arb_summary(),
        max_visible in prop_oneof![1u32..12, Just(u32::MAX - 1), Just(u32::MAX)],
    ) {
        let pager = PaginationController::new(max_visible);
        let window = pager.window(&current);
        let (start, end) = (*window.start(), *window.end());

        prop_assert_eq!(end - start + 1, max_visible.min(current.total_pages));
        prop_assert!(start >= 1);
        prop_assert!(end <= current.total_pages);
        prop_assert!(window.contains(&current.page));
    }

    #[test]
    fn prop_strip_starts_at_one_and_ends_at_last(current in arb_summary()) {
        let strip = PaginationController::default().visible_window(&current);
        let pages = strip.page_numbers();

        prop_assert_eq!(pages.first().copied(), Some(1));
        prop_assert_eq!(pages.last().copied(), Some(current.total_pages));
        prop_assert!(pages.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(
            strip.items.iter().filter(|i| matches!(i, PageItem::Page { current: true, .. })).count(),
            1
        );
        // An ellipsis always stands for at least one hidden page
        for (i, item) in strip.items.iter().enumerate() {
            if *item == PageItem::Ellipsis {
                let before = match strip.items[i - 1] { PageItem::Page { number, .. } => number, PageItem::Ellipsis => 0 };
                let after = match strip.items[i + 1] { PageItem::Page { number, .. } => number, PageItem::Ellipsis => 0 };
                prop_assert!(after > before + 1);
            }
        }
    }

    #[test]
    fn prop_navigation_never_leaves_range(current in arb_summary(), direction in prop_oneof![Just(-1i32), Just(1i32)]) {
        let pager = PaginationController::default();
        match pager.navigate(direction, Some(&current)) {
            Some(NavigationOutcome::Navigate(page)) => {
                prop_assert!(page >= 1 && page <= current.total_pages);
                prop_assert_eq!(i64::from(page), i64::from(current.page) + i64::from(direction));
            }
            Some(NavigationOutcome::Rejected(NavigationRejection::AlreadyFirstPage)) => {
                prop_assert_eq!(current.page, 1);
                prop_assert_eq!(direction, -1);
            }
            Some(NavigationOutcome::Rejected(NavigationRejection::AlreadyLastPage { last })) => {
                prop_assert_eq!(current.page, current.total_pages);
                prop_assert_eq!(last, current.total_pages);
            }
            None => prop_assert!(false, "a summary was supplied"),
        }
    }

    #[test]
    fn prop_range_label_within_total(current in arb_summary()) {
        let (start, end, total) = PaginationController::range_label(&current);
        prop_assert!(start <= end);
        prop_assert!(end <= total);
        prop_assert!(end - start < u64::from(current.per_page));
    }
}

#[test]
fn test_window_examples() {
    let pager = PaginationController::default();
    assert_eq!(pager.window(&summary(1, 20, 50)), 1..=5);
    assert_eq!(pager.window(&summary(10, 20, 50)), 8..=12);
    assert_eq!(pager.window(&summary(20, 20, 50)), 16..=20);
    assert_eq!(pager.window(&summary(2, 3, 50)), 1..=3);
}

#[test]
fn test_oversized_strip_width_shows_every_page() {
    let strip = PaginationController::new(u32::MAX).visible_window(&summary(3, 10, 50));
    assert_eq!(strip.window, 1..=10);
    assert_eq!(strip.page_numbers(), (1..=10).collect::<Vec<_>>());
    assert!(!strip.items.contains(&PageItem::Ellipsis));
}

#[test]
fn test_strip_for_middle_page() {
    let strip = PaginationController::default().visible_window(&summary(10, 20, 50));
    assert_eq!(
        strip.items,
        vec![
            PageItem::Page { number: 1, current: false },
            PageItem::Ellipsis,
            PageItem::Page { number: 8, current: false },
            PageItem::Page { number: 9, current: false },
            PageItem::Page { number: 10, current: true },
            PageItem::Page { number: 11, current: false },
            PageItem::Page { number: 12, current: false },
            PageItem::Ellipsis,
            PageItem::Page { number: 20, current: false },
        ]
    );
}

#[test]
fn test_strip_without_gap_has_no_ellipsis() {
    // Window 2..=6 of 7: page 1 and page 7 sit right next to it
    let strip = PaginationController::default().visible_window(&summary(4, 7, 50));
    assert_eq!(strip.page_numbers(), vec![1, 2, 3, 4, 5, 6, 7]);
    assert!(!strip.items.contains(&PageItem::Ellipsis));
}

#[test]
fn test_range_text_groups_digits() {
    let current = PaginationSummary {
        page: 3,
        per_page: 500,
        total: 1_234_567,
        total_pages: 2_470,
        filtered: None,
    };
    assert_eq!(
        PaginationController::range_text(&current),
        "Showing 1,001-1,500 of 1,234,567 rows"
    );
}
