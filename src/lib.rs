//! Lessonpress - Lesson page editor backend
//!
//! This library provides the publishing pipeline of a block-based lesson
//! editor: content trees are reconciled into page elements and typed
//! components inside a single database transaction.

pub mod api;
pub mod config;
pub mod db;
pub mod editor;
pub mod models;
pub mod services;
pub mod storage;
