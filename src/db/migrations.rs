//! Database migrations
//!
//! Code-based migrations embedded as SQL strings for both SQLite and MySQL,
//! tracked in a `_migrations` table. Each migration is applied inside its own
//! [`UnitOfWork`] together with its bookkeeping row.
//!
//! ```ignore
//! use lessonpress::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};

use super::unit_of_work::{with_conn, UnitOfWork};
use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users_and_categories",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                term VARCHAR(50),
                description TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS categories (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(200) NOT NULL,
                term VARCHAR(50),
                description TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_pages_and_posts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(255) NOT NULL DEFAULT '',
                meta_title VARCHAR(255) NOT NULL DEFAULT '',
                author_id INTEGER NOT NULL,
                category_id INTEGER,
                content TEXT NOT NULL,
                publication_status INTEGER NOT NULL DEFAULT 0,
                post_type VARCHAR(20) NOT NULL,
                content_type VARCHAR(50),
                object_id INTEGER,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_posts_target ON posts(content_type, object_id, post_type);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS pages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                sort_order INT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS posts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(255) NOT NULL DEFAULT '',
                meta_title VARCHAR(255) NOT NULL DEFAULT '',
                author_id BIGINT NOT NULL,
                category_id BIGINT,
                content LONGTEXT NOT NULL,
                publication_status INT NOT NULL DEFAULT 0,
                post_type VARCHAR(20) NOT NULL,
                content_type VARCHAR(50),
                object_id BIGINT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_posts_target ON posts(content_type, object_id, post_type);
        "#,
    },
    Migration {
        version: 3,
        name: "create_attachments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS attachments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL DEFAULT '',
                extension VARCHAR(100) NOT NULL DEFAULT '',
                alt VARCHAR(255) NOT NULL DEFAULT '',
                url VARCHAR(512) NOT NULL DEFAULT '',
                size INTEGER NOT NULL DEFAULT 0,
                file_type VARCHAR(20) NOT NULL DEFAULT 'file',
                file VARCHAR(512),
                storage_engine VARCHAR(20) NOT NULL DEFAULT 'local',
                attachment_type VARCHAR(20) NOT NULL DEFAULT 'file',
                content_type VARCHAR(50),
                object_id INTEGER,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_attachments_owner ON attachments(content_type, object_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS attachments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL DEFAULT '',
                extension VARCHAR(100) NOT NULL DEFAULT '',
                alt VARCHAR(255) NOT NULL DEFAULT '',
                url VARCHAR(512) NOT NULL DEFAULT '',
                size BIGINT NOT NULL DEFAULT 0,
                file_type VARCHAR(20) NOT NULL DEFAULT 'file',
                file VARCHAR(512),
                storage_engine VARCHAR(20) NOT NULL DEFAULT 'local',
                attachment_type VARCHAR(20) NOT NULL DEFAULT 'file',
                content_type VARCHAR(50),
                object_id BIGINT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_attachments_owner ON attachments(content_type, object_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_page_elements",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS page_elements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL,
                sort_order INTEGER NOT NULL,
                component_type VARCHAR(32) NOT NULL,
                component_id INTEGER NOT NULL,
                owns_component BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
                UNIQUE (page_id, sort_order)
            );
            CREATE INDEX IF NOT EXISTS idx_page_elements_component ON page_elements(component_type, component_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS page_elements (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                page_id BIGINT NOT NULL,
                sort_order INT NOT NULL,
                component_type VARCHAR(32) NOT NULL,
                component_id BIGINT NOT NULL,
                owns_component BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
                UNIQUE (page_id, sort_order)
            );
            CREATE INDEX idx_page_elements_component ON page_elements(component_type, component_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_flat_components",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS text_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                text TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS audio_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                audio VARCHAR(512),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS image_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL,
                image VARCHAR(512),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS video_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL,
                video_url VARCHAR(1024) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS record_audio_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                description TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS blue_card_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                text TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS text_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                text LONGTEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS audio_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                audio VARCHAR(512),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS image_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                description TEXT NOT NULL,
                image VARCHAR(512),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS video_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                description TEXT NOT NULL,
                video_url VARCHAR(1024) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS record_audio_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                description TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS blue_card_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                text LONGTEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 6,
        name: "create_list_components",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS question_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS question_answers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                is_correct BOOLEAN NOT NULL DEFAULT 0,
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (component_id) REFERENCES question_components(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS fill_text_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                put_words BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS fill_text_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component_id INTEGER NOT NULL,
                text_before TEXT NOT NULL,
                answer VARCHAR(255) NOT NULL,
                text_after TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (component_id) REFERENCES fill_text_components(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS put_in_order_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS put_in_order_elements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (component_id) REFERENCES put_in_order_components(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS question_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                text TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS question_answers (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                component_id BIGINT NOT NULL,
                text TEXT NOT NULL,
                is_correct BOOLEAN NOT NULL DEFAULT 0,
                sort_order INT NOT NULL DEFAULT 0,
                FOREIGN KEY (component_id) REFERENCES question_components(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS fill_text_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                put_words BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS fill_text_lines (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                component_id BIGINT NOT NULL,
                text_before TEXT NOT NULL,
                answer VARCHAR(255) NOT NULL,
                text_after TEXT NOT NULL,
                sort_order INT NOT NULL DEFAULT 0,
                FOREIGN KEY (component_id) REFERENCES fill_text_components(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS put_in_order_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS put_in_order_elements (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                component_id BIGINT NOT NULL,
                text TEXT NOT NULL,
                sort_order INT NOT NULL DEFAULT 0,
                FOREIGN KEY (component_id) REFERENCES put_in_order_components(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 7,
        name: "create_matching_components",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS matching_components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS matching_elements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                image VARCHAR(512),
                FOREIGN KEY (component_id) REFERENCES matching_components(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS matching_couples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component_id INTEGER NOT NULL,
                first_element_id INTEGER NOT NULL,
                second_element_id INTEGER NOT NULL,
                FOREIGN KEY (component_id) REFERENCES matching_components(id) ON DELETE CASCADE,
                FOREIGN KEY (first_element_id) REFERENCES matching_elements(id) ON DELETE CASCADE,
                FOREIGN KEY (second_element_id) REFERENCES matching_elements(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_matching_elements_component ON matching_elements(component_id);
            CREATE INDEX IF NOT EXISTS idx_matching_couples_component ON matching_couples(component_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS matching_components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS matching_elements (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                component_id BIGINT NOT NULL,
                text TEXT NOT NULL,
                image VARCHAR(512),
                FOREIGN KEY (component_id) REFERENCES matching_components(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS matching_couples (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                component_id BIGINT NOT NULL,
                first_element_id BIGINT NOT NULL,
                second_element_id BIGINT NOT NULL,
                FOREIGN KEY (component_id) REFERENCES matching_components(id) ON DELETE CASCADE,
                FOREIGN KEY (first_element_id) REFERENCES matching_elements(id) ON DELETE CASCADE,
                FOREIGN KEY (second_element_id) REFERENCES matching_elements(id) ON DELETE CASCADE
            );
        "#,
    },
];

/// Run all pending migrations, returning how many were applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_versions(pool).await?;
    let mut count = 0;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_versions(pool: &DynDatabasePool) -> Result<Vec<i32>> {
    let mut uow = UnitOfWork::begin(pool).await?;
    let versions: Vec<i32> = with_conn!(uow, |conn| {
        sqlx::query_scalar("SELECT version FROM _migrations ORDER BY version")
            .fetch_all(&mut *conn)
            .await
            .context("Failed to read applied migrations")?
    });
    uow.commit().await?;
    Ok(versions)
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    let mut uow = UnitOfWork::begin(pool).await?;
    for statement in split_sql_statements(sql) {
        with_conn!(uow, |conn| {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        });
    }
    with_conn!(uow, |conn| {
        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(&mut *conn)
            .await
            .context("Failed to record migration")?;
    });
    uow.commit().await?;

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count())
}
