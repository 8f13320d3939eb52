//! Database repositories
//!
//! Row access for each entity. Every function runs inside a caller-owned
//! [`UnitOfWork`](crate::db::UnitOfWork), so a whole editor action reads and
//! writes through a single transaction.

pub mod attachment;
pub mod category;
pub mod page;
pub mod page_element;
pub mod post;
pub mod user;
