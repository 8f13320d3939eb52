//! Lesson page and page element models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type tag used by generic references that point at a page
pub const PAGE_CONTENT_TYPE: &str = "page";

/// Ordered container of page elements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Page {
    pub id: i64,
    pub title: String,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One slot of a page's ordered content.
///
/// `component_type` holds the registry tag; together with `component_id` it
/// points at exactly one component row. `owns_component` is false when the
/// slot reuses a component that was referenced statically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct PageElement {
    pub id: i64,
    pub page_id: i64,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: i32,
    pub component_type: String,
    pub component_id: i64,
    pub owns_component: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PageElement {
    pub fn component_ref(&self) -> (&str, i64) {
        (self.component_type.as_str(), self.component_id)
    }
}

/// Values written for a page element during reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSlot {
    pub order: i32,
    pub component_type: String,
    pub component_id: i64,
    pub owns_component: bool,
}
