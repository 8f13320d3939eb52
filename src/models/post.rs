//! Editor post model
//!
//! A post is an editor session: it stores the raw block document and points
//! at the page it publishes into through a generic `(content_type, object_id)`
//! reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CategoryInfo, UserInfo, PAGE_CONTENT_TYPE};

/// Post type of editor sessions
pub const EDITOR_POST_TYPE: &str = "editor";
/// Post type of the public mirror refreshed on every publish
pub const PUBLIC_POST_TYPE: &str = "lesson-page-public";

/// Publication status, stored as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicationStatus {
    #[default]
    Draft,
    Publish,
}

impl PublicationStatus {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Draft => 0,
            Self::Publish => 1,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Draft),
            1 => Some(Self::Publish),
            _ => None,
        }
    }
}

impl std::fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

impl Serialize for PublicationStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for PublicationStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i32::deserialize(deserializer)?;
        Self::from_i32(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid publication status: {}", value)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub meta_title: String,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub content: String,
    pub publication_status: i32,
    pub post_type: String,
    pub content_type: Option<String>,
    pub object_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn status(&self) -> PublicationStatus {
        PublicationStatus::from_i32(self.publication_status).unwrap_or_default()
    }

    pub fn is_published(&self) -> bool {
        self.status() == PublicationStatus::Publish
    }

    /// Id of the page this post publishes into, if it targets one
    pub fn target_page_id(&self) -> Option<i64> {
        match self.content_type.as_deref() {
            Some(PAGE_CONTENT_TYPE) => self.object_id,
            _ => None,
        }
    }
}

/// Values for inserting a post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub content: String,
    pub status: PublicationStatus,
    pub post_type: String,
    pub content_type: Option<String>,
    pub object_id: Option<i64>,
}

/// Normalized post summary returned by editor actions
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostInstance {
    pub id: i64,
    pub title: String,
    pub meta_title: String,
    pub author: Option<UserInfo>,
    pub category: Option<CategoryInfo>,
    pub publication_status: PublicationStatus,
    pub content_type: Option<String>,
    pub object_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for opening a new editor session
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEditorPostInput {
    pub title: String,
    #[serde(default)]
    pub page_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publication_status_serializes_as_integer() {
        assert_eq!(serde_json::to_value(PublicationStatus::Publish).unwrap(), 1);
        let status: PublicationStatus = serde_json::from_value(serde_json::json!(0)).unwrap();
        assert_eq!(status, PublicationStatus::Draft);
        assert!(serde_json::from_value::<PublicationStatus>(serde_json::json!(7)).is_err());
    }
}
