//! Splits ordered sequences into fixed-size pages.

/// The number of posts per index page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 12;

/// One page of a larger sequence along with where it sits in that sequence.
/// Page numbers are 1-based.
#[derive(Clone, Debug, PartialEq)]
pub struct Pagination<T> {
    /// The items on the current page, in their original order.
    pub items: Vec<T>,
    pub current_page: usize,

    /// Always at least 1, even when there are no items.
    pub total_pages: usize,
    pub total_items: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Returns page `page` of `items`. Out-of-range page numbers are clamped to
/// the first or last page rather than rejected, and a `page_size` of zero is
/// treated as one.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Pagination<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_pages(total_items, page_size);
    let current_page = page.clamp(1, total_pages);

    let start = ((current_page - 1) * page_size).min(total_items);
    let end = (start + page_size).min(total_items);

    Pagination {
        items: items[start..end].to_vec(),
        current_page,
        total_pages,
        total_items,
        has_next_page: current_page < total_pages,
        has_previous_page: current_page > 1,
    }
}

/// `max(1, ceil(total_items / page_size))`.
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    match total_items % page_size {
        0 => total_items / page_size,
        _ => total_items / page_size + 1,
    }
    .max(1)
}

impl<T> Pagination<T> {
    /// The pager entries for this page. See [`visible_pages`].
    pub fn visible_pages(&self) -> Vec<PageLink> {
        visible_pages(self.current_page, self.total_pages)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Pagination<U> {
        Pagination {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            total_pages: self.total_pages,
            total_items: self.total_items,
            has_next_page: self.has_next_page,
            has_previous_page: self.has_previous_page,
        }
    }
}

/// An entry in a pager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageLink {
    Number(usize),

    /// Stands in for a run of skipped page numbers.
    Ellipsis,
}

/// How many pages either side of the current page a pager shows.
const PAGER_RADIUS: usize = 2;

/// Returns the pager entries for `current` of `total` pages: the first and
/// last pages always, every page within two of `current`, and an ellipsis
/// wherever that leaves a gap. Empty if there is only one page.
///
/// For example, page 6 of 12 gives `1 … 4 5 6 7 8 … 12`.
pub fn visible_pages(current: usize, total: usize) -> Vec<PageLink> {
    if total <= 1 {
        return Vec::new();
    }
    let current = current.clamp(1, total);
    let window_start = current.saturating_sub(PAGER_RADIUS).max(2);
    let window_end = (current + PAGER_RADIUS).min(total - 1);

    let mut links = vec![PageLink::Number(1)];
    if window_start > 2 {
        links.push(PageLink::Ellipsis);
    }
    links.extend((window_start..=window_end).map(PageLink::Number));
    if window_end + 1 < total {
        links.push(PageLink::Ellipsis);
    }
    links.push(PageLink::Number(total));
    links
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use PageLink::{Ellipsis, Number};

    #[test]
    fn test_first_page() {
        let items: Vec<usize> = (0..14).collect();
        let page = paginate(&items, 1, 12);
        assert_eq!((0..12).collect::<Vec<_>>(), page.items);
        assert_eq!(1, page.current_page);
        assert_eq!(2, page.total_pages);
        assert_eq!(14, page.total_items);
        assert!(page.has_next_page);
        assert!(!page.has_previous_page);
    }

    #[test]
    fn test_last_page_is_partial() {
        let items: Vec<usize> = (0..14).collect();
        let page = paginate(&items, 2, 12);
        assert_eq!(vec![12, 13], page.items);
        assert!(!page.has_next_page);
        assert!(page.has_previous_page);
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<usize> = Vec::new();
        let page = paginate(&items, 3, 12);
        assert!(page.items.is_empty());
        assert_eq!(1, page.current_page);
        assert_eq!(1, page.total_pages);
        assert_eq!(0, page.total_items);
        assert!(!page.has_next_page);
        assert!(!page.has_previous_page);
    }

    #[test]
    fn test_zero_page_size() {
        let page = paginate(&["a", "b"], 2, 0);
        assert_eq!(vec!["b"], page.items);
        assert_eq!(2, page.total_pages);
    }

    #[test]
    fn test_clamp() {
        let items: Vec<usize> = (0..30).collect();
        assert_eq!(paginate(&items, 1, 12), paginate(&items, 0, 12));
        assert_eq!(paginate(&items, 3, 12), paginate(&items, 8, 12));
        assert_eq!(paginate(&items, 3, 12), paginate(&items, usize::MAX, 12));
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = paginate(&[1, 2, 3], 2, 2).map(|n| n * 10);
        assert_eq!(vec![30], page.items);
        assert_eq!(2, page.current_page);
        assert_eq!(2, page.total_pages);
    }

    #[test]
    fn test_visible_pages() {
        assert_eq!(Vec::<PageLink>::new(), visible_pages(1, 1));
        assert_eq!(vec![Number(1), Number(2)], visible_pages(1, 2));
        assert_eq!(
            vec![Number(1), Number(2), Number(3), Number(4), Number(5)],
            visible_pages(3, 5)
        );
        assert_eq!(
            vec![
                Number(1),
                Ellipsis,
                Number(4),
                Number(5),
                Number(6),
                Number(7),
                Number(8),
                Ellipsis,
                Number(12)
            ],
            visible_pages(6, 12)
        );
        assert_eq!(
            vec![Number(1), Number(2), Number(3), Ellipsis, Number(12)],
            visible_pages(1, 12)
        );
        assert_eq!(
            vec![Number(1), Ellipsis, Number(10), Number(11), Number(12)],
            visible_pages(12, 12)
        );
    }

    proptest! {
        #[test]
        fn prop_pages_cover_all_items(n in 0usize..200, page_size in 1usize..30) {
            let items: Vec<usize> = (0..n).collect();
            let first = paginate(&items, 1, page_size);
            prop_assert_eq!(first.total_pages, std::cmp::max(1, (n + page_size - 1) / page_size));

            let mut seen = Vec::new();
            for page in 1..=first.total_pages {
                seen.extend(paginate(&items, page, page_size).items);
            }
            prop_assert_eq!(items, seen);
        }

        #[test]
        fn prop_out_of_range_pages_clamp(
            n in 0usize..200,
            page_size in 1usize..30,
            over in 1usize..10,
        ) {
            let items: Vec<usize> = (0..n).collect();
            let last = paginate(&items, 1, page_size).total_pages;
            prop_assert_eq!(paginate(&items, 0, page_size), paginate(&items, 1, page_size));
            prop_assert_eq!(
                paginate(&items, last + over, page_size),
                paginate(&items, last, page_size)
            );
        }

        #[test]
        fn prop_page_length(n in 1usize..200, page_size in 1usize..30, page in 1usize..20) {
            let items: Vec<usize> = (0..n).collect();
            let result = paginate(&items, page, page_size);
            let wanted = std::cmp::min(page_size, n - (result.current_page - 1) * page_size);
            prop_assert_eq!(wanted, result.items.len());
        }
    }
}
