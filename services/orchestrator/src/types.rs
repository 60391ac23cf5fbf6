use serde::{Deserialize, Serialize};

use crate::error::GrnError;

/// `<prefix>_<12 hex>`
pub fn new_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..12])
}

pub const MAX_PAGE_LIMIT: i64 = 1000;
pub const DEFAULT_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl PageQuery {
    pub fn validate(self) -> Result<Page, GrnError> {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if skip < 0 {
            return Err(GrnError::Validation("skip must be >= 0".into()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(GrnError::Validation(format!("limit must be between 1 and {MAX_PAGE_LIMIT}")));
        }
        Ok(Page { skip: skip as usize, limit: limit as usize })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
