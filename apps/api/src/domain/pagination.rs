use serde::Serialize;

/// Which rows a query should see with respect to the soft-delete flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    /// Rows with `is_deleted = false`
    Active,
    /// Rows with `is_deleted = true`
    Deleted,
    /// Every row regardless of the flag
    Any,
}

impl RecordScope {
    /// Returns true if a row with the given deleted flag belongs to this scope
    pub fn includes(&self, is_deleted: bool) -> bool {
        match self {
            RecordScope::Active => !is_deleted,
            RecordScope::Deleted => is_deleted,
            RecordScope::Any => true,
        }
    }
}

/// A requested result window
///
/// # Invariants
/// - `page_size` is between 1 and [`PageRequest::MAX_PAGE_SIZE`]
/// - `page_number` starts at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_size: u32,
    page_number: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Builds a page request, clamping missing or out-of-range values
    ///
    /// # Example
    /// ```
    /// use online_store_api::domain::pagination::PageRequest;
    ///
    /// let request = PageRequest::new(Some(20), Some(3));
    /// assert_eq!(request.offset(), 40);
    /// assert_eq!(request.limit(), 20);
    /// ```
    pub fn new(page_size: Option<u32>, page_number: Option<u32>) -> Self {
        let page_size = page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE);
        let page_number = page_number.unwrap_or(1).max(1);

        Self {
            page_size,
            page_number,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Number of rows to skip
    pub fn offset(&self) -> i64 {
        i64::from(self.page_size) * i64::from(self.page_number - 1)
    }

    /// Number of rows to return
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One window of a paginated listing
///
/// Serializes as `{ "items": [...], "page": n, "pages": m }`.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    /// Wraps a window of items given the total matching row count
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        Self {
            items,
            page: request.page_number(),
            pages: page_count(total, request.page_size()),
        }
    }

    /// Converts every item, keeping the window metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            pages: self.pages,
        }
    }
}

/// `ceil(total / page_size)`
pub fn page_count(total: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    u32::try_from(total.div_ceil(page_size)).unwrap_or(u32::MAX)
}

/// Applies a page request to an already filtered and ordered list
pub fn paginate<T>(rows: Vec<T>, request: &PageRequest) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let limit = request.page_size() as usize;
    let window = rows.into_iter().skip(offset).take(limit).collect();
    (window, total)
}
