//! Data models
//!
//! Database entities and API input/output types of the lesson editor:
//! - Pages and their ordered elements
//! - Editor posts and their public mirrors
//! - Attachments
//! - Users and categories (read only, for post summaries)

mod attachment;
mod category;
mod page;
mod post;
mod user;

pub use attachment::{Attachment, NewAttachment, POST_CONTENT_TYPE};
pub use category::{Category, CategoryInfo};
pub use page::{ElementSlot, Page, PageElement, PAGE_CONTENT_TYPE};
pub use post::{
    CreateEditorPostInput, NewPost, Post, PostInstance, PublicationStatus, EDITOR_POST_TYPE,
    PUBLIC_POST_TYPE,
};
pub use user::{User, UserInfo};
