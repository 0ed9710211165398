//! Author repository
//!
//! Author names are unique; callers resolving a free-text author name rely
//! on the constraint to detect an existing row.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Author, LookupItem, NewAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    /// Insert an author. Fails on a duplicate name.
    async fn create(&self, author: &NewAuthor) -> Result<Author>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>>;

    /// Exact name match
    async fn get_by_name(&self, name: &str) -> Result<Option<Author>>;

    /// Case-insensitive substring search on name, ordered by name
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<LookupItem>>;
}

pub struct SqlxAuthorRepository {
    pool: DynDatabasePool,
}

impl SqlxAuthorRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuthorRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_AUTHOR: &str =
    "SELECT id, name, bio, birth_date, death_date, created_at FROM authors";

#[async_trait]
impl AuthorRepository for SqlxAuthorRepository {
    async fn create(&self, author: &NewAuthor) -> Result<Author> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_author_sqlite(pool, author).await,
            Backend::Mysql(pool) => create_author_mysql(pool, author).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>> {
        let sql = format!("{} WHERE id = ?", SELECT_AUTHOR);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get author by ID")?;
                Ok(row.as_ref().map(row_to_author_sqlite))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get author by ID")?;
                Ok(row.as_ref().map(row_to_author_mysql))
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Author>> {
        let sql = format!("{} WHERE name = ?", SELECT_AUTHOR);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get author by name")?;
                Ok(row.as_ref().map(row_to_author_sqlite))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get author by name")?;
                Ok(row.as_ref().map(row_to_author_mysql))
            }
        }
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<LookupItem>> {
        let sql = "SELECT id, name FROM authors WHERE LOWER(name) LIKE ? ORDER BY name LIMIT ?";
        let pattern = format!("%{}%", query.to_lowercase());
        let items = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(pool)
                .await
                .context("Failed to search authors")?
                .iter()
                .map(|row| LookupItem { id: row.get("id"), name: row.get("name") })
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(pool)
                .await
                .context("Failed to search authors")?
                .iter()
                .map(|row| LookupItem { id: row.get("id"), name: row.get("name") })
                .collect(),
        };
        Ok(items)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_author_sqlite(pool: &SqlitePool, author: &NewAuthor) -> Result<Author> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO authors (name, bio, birth_date, death_date, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&author.name)
    .bind(&author.bio)
    .bind(author.birth_date)
    .bind(author.death_date)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create author")?;

    Ok(Author {
        id: result.last_insert_rowid(),
        name: author.name.clone(),
        bio: author.bio.clone(),
        birth_date: author.birth_date,
        death_date: author.death_date,
        created_at: now,
    })
}

fn row_to_author_sqlite(row: &sqlx::sqlite::SqliteRow) -> Author {
    Author {
        id: row.get("id"),
        name: row.get("name"),
        bio: row.get("bio"),
        birth_date: row.get("birth_date"),
        death_date: row.get("death_date"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_author_mysql(pool: &MySqlPool, author: &NewAuthor) -> Result<Author> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO authors (name, bio, birth_date, death_date, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&author.name)
    .bind(&author.bio)
    .bind(author.birth_date)
    .bind(author.death_date)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create author")?;

    Ok(Author {
        id: result.last_insert_id() as i64,
        name: author.name.clone(),
        bio: author.bio.clone(),
        birth_date: author.birth_date,
        death_date: author.death_date,
        created_at: now,
    })
}

fn row_to_author_mysql(row: &sqlx::mysql::MySqlRow) -> Author {
    Author {
        id: row.get("id"),
        name: row.get("name"),
        bio: row.get("bio"),
        birth_date: row.get("birth_date"),
        death_date: row.get("death_date"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::NaiveDate;

    async fn setup_test_repo() -> SqlxAuthorRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxAuthorRepository::new(pool)
    }

    fn named(name: &str) -> NewAuthor {
        NewAuthor { name: name.to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn test_create_author_with_dates() {
        let repo = setup_test_repo().await;
        let author = NewAuthor {
            name: "Margarete Schütte-Lihotzky".into(),
            bio: Some("Architect".into()),
            birth_date: NaiveDate::from_ymd_opt(1897, 1, 23),
            death_date: NaiveDate::from_ymd_opt(2000, 1, 18),
        };
        let created = repo.create(&author).await.expect("Failed to create author");

        let found = repo.get_by_id(created.id).await.unwrap().expect("Author not found");
        assert_eq!(found.name, author.name);
        assert_eq!(found.birth_date, author.birth_date);
        assert_eq!(found.death_date, author.death_date);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_unique_violation() {
        let repo = setup_test_repo().await;
        let first = repo.create(&named("Adolf Loos")).await.unwrap();

        let err = repo.create(&named("Adolf Loos")).await.unwrap_err();
        assert!(crate::db::is_unique_violation(&err));

        let existing = repo.get_by_name("Adolf Loos").await.unwrap().unwrap();
        assert_eq!(existing.id, first.id);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_limited() {
        let repo = setup_test_repo().await;
        for name in ["Otto Wagner", "Josef Hoffmann", "Koloman Moser", "Otto Prutscher"] {
            repo.create(&named(name)).await.unwrap();
        }

        let hits = repo.search("OTTO", 8).await.unwrap();
        let names: Vec<_> = hits.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Otto Prutscher", "Otto Wagner"]);

        assert_eq!(repo.search("o", 2).await.unwrap().len(), 2);
    }
}
