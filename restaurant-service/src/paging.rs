use serde::Deserialize;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_RECORDS_PER_PAGE: i64 = 10;

/// Query-string pagination for list endpoints. Client-facing parameter
/// names are kept as-is for compatibility with existing clients.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    #[serde(rename = "recordPerPage")]
    pub records_per_page: Option<i64>,
    #[serde(rename = "startIndex")]
    pub start_index: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start_index: usize,
    pub records_per_page: usize,
}

impl PageParams {
    /// Resolve to a concrete window. Non-positive values fall back to
    /// the defaults; an explicit startIndex overrides the page-derived
    /// offset.
    pub fn window(&self) -> PageWindow {
        let records_per_page = match self.records_per_page {
            Some(value) if value > 0 => value,
            _ => DEFAULT_RECORDS_PER_PAGE,
        };
        let page = match self.page {
            Some(value) if value > 0 => value,
            _ => DEFAULT_PAGE,
        };

        let derived = (page - 1) * records_per_page;
        let start_index = match self.start_index {
            Some(value) if value >= 0 => value,
            _ => derived,
        };

        PageWindow {
            start_index: start_index as usize,
            records_per_page: records_per_page as usize,
        }
    }
}

impl PageWindow {
    /// Slice one page out of an already-filtered result set.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.start_index)
            .take(self.records_per_page)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_ten() {
        let window = PageParams::default().window();
        assert_eq!(window.start_index, 0);
        assert_eq!(window.records_per_page, 10);
    }

    #[test]
    fn page_derives_offset() {
        let params = PageParams {
            page: Some(3),
            records_per_page: Some(5),
            start_index: None,
        };
        let window = params.window();
        assert_eq!(window.start_index, 10);
        assert_eq!(window.records_per_page, 5);
    }

    #[test]
    fn explicit_start_index_wins() {
        let params = PageParams {
            page: Some(3),
            records_per_page: Some(5),
            start_index: Some(2),
        };
        assert_eq!(params.window().start_index, 2);
    }

    #[test]
    fn non_positive_values_fall_back() {
        let params = PageParams {
            page: Some(0),
            records_per_page: Some(-4),
            start_index: Some(-1),
        };
        let window = params.window();
        assert_eq!(window.start_index, 0);
        assert_eq!(window.records_per_page, 10);
    }

    #[test]
    fn apply_slices_past_the_end_to_empty() {
        let window = PageWindow {
            start_index: 5,
            records_per_page: 10,
        };
        let page = window.apply(vec![1, 2, 3]);
        assert!(page.is_empty());
    }
}
