//! Pagination primitives shared by both adapters.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize)]
pub struct PageMetadata {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_limit() -> usize {
    20
}

impl PageMetadata {
    /// Clamp `limit` to `max` and validate `order` against an allow-list.
    pub fn normalize(
        mut self,
        max_limit: usize,
        allowed_order: &[&str],
    ) -> crate::error::Result<Self> {
        if self.limit == 0 || self.limit > max_limit {
            self.limit = self.limit.min(max_limit).max(1);
        }
        if let Some(order) = &self.order {
            if !allowed_order.contains(&order.as_str()) {
                return Err(crate::error::Error::Validation(format!(
                    "unknown order field: {order}"
                )));
            }
        }
        if let Some(dir) = &self.dir {
            if dir != "asc" && dir != "desc" {
                return Err(crate::error::Error::Validation(format!(
                    "unknown sort direction: {dir}"
                )));
            }
        }
        Ok(self)
    }

    pub fn ascending(&self) -> bool {
        self.dir.as_deref() != Some("desc")
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, page: &PageMetadata) -> Self {
        Self {
            items,
            total,
            offset: page.offset,
            limit: page.limit,
        }
    }
}
