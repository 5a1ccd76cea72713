//! Offset pagination helpers for the product listing.

const WINDOW_WIDTH: u32 = 5;

/// Offset of the first item on `page` (1-based).
pub fn offset_for(page: u32, page_size: u32) -> u32 {
    page.max(1).saturating_sub(1).saturating_mul(page_size)
}

/// Page count to render controls for.
///
/// The listing endpoint reports no total, so unless one is configured the
/// count is inferred: a full page means at least one more page may exist.
pub fn total_pages(configured: Option<u32>, current: u32, fetched: usize, page_size: u32) -> u32 {
    if let Some(total) = configured {
        return total.max(1);
    }
    let current = current.max(1);
    let full = usize::try_from(page_size).is_ok_and(|size| size > 0 && fetched >= size);
    if full {
        current.saturating_add(1)
    } else {
        current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page { number: u32, current: bool },
    Ellipsis,
}

/// Navigation controls for a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub current: u32,
    pub total: u32,
    pub items: Vec<PageItem>,
}

impl PageWindow {
    /// Up to five page numbers around `current`, with the first and last
    /// pages pinned and gaps marked by ellipses.
    pub fn new(current: u32, total: u32) -> Self {
        let total = total.max(1);
        let current = current.clamp(1, total);

        let mut start = current.saturating_sub(WINDOW_WIDTH / 2).max(1);
        let end = total.min(start + WINDOW_WIDTH - 1);
        if end - start + 1 < WINDOW_WIDTH {
            start = end.saturating_sub(WINDOW_WIDTH - 1).max(1);
        }

        let mut items = Vec::new();
        if start > 1 {
            items.push(PageItem::Page {
                number: 1,
                current: false,
            });
            if start > 2 {
                items.push(PageItem::Ellipsis);
            }
        }
        items.extend((start..=end).map(|number| PageItem::Page {
            number,
            current: number == current,
        }));
        if end < total {
            if end < total - 1 {
                items.push(PageItem::Ellipsis);
            }
            items.push(PageItem::Page {
                number: total,
                current: false,
            });
        }

        Self {
            current,
            total,
            items,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total
    }

    pub fn numbers(&self) -> Vec<u32> {
        self.items
            .iter()
            .filter_map(|item| match item {
                PageItem::Page { number, .. } => Some(*number),
                PageItem::Ellipsis => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_zero_based() {
        assert_eq!(offset_for(1, 20), 0);
        assert_eq!(offset_for(3, 20), 40);
        assert_eq!(offset_for(0, 20), 0);
    }

    #[test]
    fn total_prefers_configured_value() {
        assert_eq!(total_pages(Some(10), 2, 0, 20), 10);
        assert_eq!(total_pages(None, 2, 20, 20), 3);
        assert_eq!(total_pages(None, 2, 7, 20), 2);
        assert_eq!(total_pages(None, 1, 0, 20), 1);
    }

    #[test]
    fn window_near_start_pins_last_page() {
        let window = PageWindow::new(1, 10);
        assert_eq!(window.numbers(), vec![1, 2, 3, 4, 5, 10]);
        assert_eq!(
            window.items[0],
            PageItem::Page {
                number: 1,
                current: true
            }
        );
        assert_eq!(window.items[5], PageItem::Ellipsis);
        assert!(!window.has_previous());
        assert!(window.has_next());
    }

    #[test]
    fn window_in_middle_has_both_ellipses() {
        let window = PageWindow::new(6, 12);
        assert_eq!(
            window.items,
            vec![
                PageItem::Page {
                    number: 1,
                    current: false
                },
                PageItem::Ellipsis,
                PageItem::Page {
                    number: 4,
                    current: false
                },
                PageItem::Page {
                    number: 5,
                    current: false
                },
                PageItem::Page {
                    number: 6,
                    current: true
                },
                PageItem::Page {
                    number: 7,
                    current: false
                },
                PageItem::Page {
                    number: 8,
                    current: false
                },
                PageItem::Ellipsis,
                PageItem::Page {
                    number: 12,
                    current: false
                },
            ]
        );
    }

    #[test]
    fn window_at_end_shifts_left() {
        let window = PageWindow::new(10, 10);
        assert_eq!(window.numbers(), vec![1, 6, 7, 8, 9, 10]);
        assert!(!window.has_next());
    }

    #[test]
    fn small_totals_show_every_page() {
        assert_eq!(PageWindow::new(2, 3).numbers(), vec![1, 2, 3]);
        assert_eq!(PageWindow::new(5, 1).numbers(), vec![1]);
    }
}
