//! Explicit unit of work
//!
//! A [`UnitOfWork`] owns one database transaction for the configured backend
//! plus the list of stored files that became unreferenced while it was open.
//! Callers hand `&mut UnitOfWork` to repositories and the reconciliation
//! engine, then decide themselves whether to [`UnitOfWork::commit`] or
//! [`UnitOfWork::rollback`]. Dropping an uncommitted unit of work rolls the
//! transaction back.
//!
//! File deletions are never executed inside the transaction: they are
//! returned from `commit` so the caller removes them only once the rows that
//! referenced them are gone for good.

use anyhow::{Context, Result};
use sqlx::{mysql::MySqlQueryResult, sqlite::SqliteQueryResult, MySql, Sqlite, Transaction};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// Backend specific transaction
pub enum Tx {
    Sqlite(Transaction<'static, Sqlite>),
    Mysql(Transaction<'static, MySql>),
}

pub struct UnitOfWork {
    tx: Tx,
    orphaned_files: Vec<String>,
}

impl UnitOfWork {
    /// Begin a new transaction on the pool's backend
    pub async fn begin(pool: &DynDatabasePool) -> Result<Self> {
        let tx = match pool.driver() {
            DatabaseDriver::Sqlite => {
                let sqlite = pool.as_sqlite().context("SQLite pool not available")?;
                Tx::Sqlite(sqlite.begin().await.context("Failed to begin transaction")?)
            }
            DatabaseDriver::Mysql => {
                let mysql = pool.as_mysql().context("MySQL pool not available")?;
                Tx::Mysql(mysql.begin().await.context("Failed to begin transaction")?)
            }
        };

        Ok(Self {
            tx,
            orphaned_files: Vec::new(),
        })
    }

    pub fn tx_mut(&mut self) -> &mut Tx {
        &mut self.tx
    }

    pub fn driver(&self) -> DatabaseDriver {
        match self.tx {
            Tx::Sqlite(_) => DatabaseDriver::Sqlite,
            Tx::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    /// Remember a stored file to delete once this unit of work commits
    pub fn schedule_file_deletion(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !key.is_empty() && !self.orphaned_files.contains(&key) {
            self.orphaned_files.push(key);
        }
    }

    pub fn scheduled_file_deletions(&self) -> &[String] {
        &self.orphaned_files
    }

    /// Commit the transaction, returning the files that are now unreferenced
    pub async fn commit(self) -> Result<Vec<String>> {
        match self.tx {
            Tx::Sqlite(tx) => tx.commit().await,
            Tx::Mysql(tx) => tx.commit().await,
        }
        .context("Failed to commit transaction")?;
        Ok(self.orphaned_files)
    }

    /// Roll the transaction back, discarding scheduled file deletions
    pub async fn rollback(self) -> Result<()> {
        match self.tx {
            Tx::Sqlite(tx) => tx.rollback().await,
            Tx::Mysql(tx) => tx.rollback().await,
        }
        .context("Failed to roll back transaction")
    }
}

/// Id of the row created by an INSERT, for either backend
pub trait LastInsertId {
    fn last_id(&self) -> i64;
}

impl LastInsertId for SqliteQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl LastInsertId for MySqlQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// Run `$body` against the unit of work's connection.
///
/// The body is expanded once per backend, so the same query text and row
/// mapping serve SQLite and MySQL alike.
macro_rules! with_conn {
    ($uow:expr, |$conn:ident| $body:expr) => {
        match $uow.tx_mut() {
            $crate::db::unit_of_work::Tx::Sqlite(tx) => {
                let $conn: &mut sqlx::SqliteConnection = &mut **tx;
                $body
            }
            $crate::db::unit_of_work::Tx::Mysql(tx) => {
                let $conn: &mut sqlx::MySqlConnection = &mut **tx;
                $body
            }
        }
    };
}

pub(crate) use with_conn;
