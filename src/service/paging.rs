use crate::models::Page;

/// 总页数, 空序列也至少 1 页
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    total_items.div_ceil(page_size).max(1)
}

/// 纯窗口函数: 超出范围的页返回空
pub fn slice<T: Clone>(items: &[T], page_number: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let start = page_number.saturating_sub(1).saturating_mul(page_size);
    let end = start.saturating_add(page_size).min(items.len());

    let window = if start < items.len() {
        items[start..end].to_vec()
    } else {
        Vec::new()
    };

    Page {
        items: window,
        page_number,
        total_pages: total_pages(items.len(), page_size),
    }
}

/// 分页导航状态, 所有跳转都限制在 [1, total_pages]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    page_size: usize,
    page_number: usize,
    total_items: usize,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page_number: 1,
            total_items: 0,
        }
    }

    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.total_items, self.page_size)
    }

    /// 底层序列被替换时回到第 1 页
    pub fn reset(&mut self, total_items: usize) {
        self.total_items = total_items;
        self.page_number = 1;
    }

    pub fn go_to(&mut self, page_number: usize) -> usize {
        self.page_number = page_number.clamp(1, self.total_pages());
        self.page_number
    }

    pub fn next(&mut self) -> bool {
        if self.page_number < self.total_pages() {
            self.page_number += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.page_number > 1 {
            self.page_number -= 1;
            true
        } else {
            false
        }
    }

    pub fn window<T: Clone>(&self, items: &[T]) -> Page<T> {
        slice(items, self.page_number, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up_with_minimum_of_one() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(25, 5), 5);
    }

    #[test]
    fn empty_list_yields_single_empty_page() {
        let page = slice::<u32>(&[], 1, 10);
        assert!(page.items.is_empty());
        assert_eq!(page.page_number, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn pages_concatenate_to_original_sequence() {
        let items: Vec<u32> = (0..23).collect();
        for page_size in [1, 4, 5, 10, 23, 50] {
            let pages = total_pages(items.len(), page_size);
            let rebuilt: Vec<u32> = (1..=pages)
                .flat_map(|n| slice(&items, n, page_size).items)
                .collect();
            assert_eq!(rebuilt, items, "page_size {page_size}");
        }
    }

    #[test]
    fn page_past_end_is_empty() {
        let items = vec!['a', 'b', 'c'];
        let page = slice(&items, 3, 2);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn pager_navigation_respects_bounds() {
        let items: Vec<u32> = (0..25).collect();
        let mut pager = Pager::new(10);
        pager.reset(items.len());

        assert!(!pager.prev());
        assert!(pager.next());
        assert!(pager.next());
        assert!(!pager.next());
        assert_eq!(pager.page_number(), 3);
        assert_eq!(pager.window(&items).items, vec![20, 21, 22, 23, 24]);

        assert_eq!(pager.go_to(99), 3);
        assert_eq!(pager.go_to(0), 1);

        pager.go_to(2);
        pager.reset(4);
        assert_eq!(pager.page_number(), 1);
        assert_eq!(pager.total_pages(), 1);
    }
}
