//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lesson category a post is filed under
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub term: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category info embedded in a post summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryInfo {
    pub id: i64,
    pub title: String,
}

impl From<&Category> for CategoryInfo {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            title: category.title.clone(),
        }
    }
}
