/// One page of a paginated server listing
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PageWindow<T> {
    /// In arrival order
    pub items: Vec<T>,
    pub page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> PageWindow<T> {
    pub fn empty() -> PageWindow<T> {
        PageWindow {
            items: Vec::new(),
            page: 0,
            total: 0,
            total_pages: 0,
        }
    }

    pub fn total_pages_for(total: u64, limit: u32) -> u32 {
        match limit {
            0 => 0,
            limit => u32::try_from((total + u64::from(limit) - 1) / u64::from(limit))
                .unwrap_or(u32::MAX),
        }
    }
}

impl<T> Default for PageWindow<T> {
    fn default() -> PageWindow<T> {
        PageWindow::empty()
    }
}

/// One page of replies. The server may omit pagination metadata, in which case
/// clients derive whether there is more from the root's reply count.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ReplyPage<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}
