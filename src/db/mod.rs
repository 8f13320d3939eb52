//! Database layer
//!
//! This module provides database abstraction for the lesson editor.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Architecture
//!
//! The pool is hidden behind the `DatabasePool` trait. All reads and writes
//! go through an explicit [`UnitOfWork`], which owns a transaction on the
//! configured backend and is committed or rolled back by the caller.
//!
//! # Usage
//!
//! ```ignore
//! use lessonpress::config::DatabaseConfig;
//! use lessonpress::db::{create_pool, migrations, UnitOfWork};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//!
//! let mut uow = UnitOfWork::begin(&pool).await?;
//! // ... repository calls ...
//! uow.commit().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod unit_of_work;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
pub use unit_of_work::{LastInsertId, Tx, UnitOfWork};
