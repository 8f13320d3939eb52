//! Lesson page editor
//!
//! The publishing pipeline behind the block editor:
//! - [`registry`]: component type tags and their handlers
//! - [`components`]: one handler per component type
//! - [`parser`]: content tree to ordered blocks
//! - [`reconcile`]: converging page elements to a content tree
//! - [`matching`]: matching element/couple graph synchronization

pub mod component;
pub mod components;
pub mod error;
pub mod matching;
pub mod parser;
pub mod reconcile;
pub mod registry;

pub use component::{Component, ComponentType};
pub use error::{BlockError, EditorError, EditorResult, FieldError};
pub use parser::{BlockAction, EditorDocument, ParsedBlock};
pub use reconcile::{ReconcileStats, Reconciler, Reconciliation};
pub use registry::{ComponentHandler, ComponentRegistry};
