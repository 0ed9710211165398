//! Archive entry repository
//!
//! Keyword and link lists are written as JSON arrays and read back through
//! `services::form::parse_keyword_field`, which also accepts legacy plain
//! text values.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    ArchiveEntry, AuthorRef, EntryListing, EntryStatus, EntryType, Location, NewArchiveEntry,
};
use crate::services::form::{encode_list, parse_keyword_field};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait ArchiveEntryRepository: Send + Sync {
    async fn create(&self, entry: &NewArchiveEntry) -> Result<ArchiveEntry>;

    /// Overwrite the editable fields of an entry. `created_by` is kept.
    ///
    /// Returns `None` if the entry does not exist.
    async fn update(&self, id: i64, entry: &NewArchiveEntry) -> Result<Option<ArchiveEntry>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ArchiveEntry>>;

    /// Returns false if the entry does not exist
    async fn set_status(&self, id: i64, status: EntryStatus) -> Result<bool>;

    /// Delete an entry; media, favorites and tour stops cascade
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Entries of one status joined with author and location, newest first.
    /// `cover_url` is left empty for the caller to resolve.
    async fn list_listings(&self, status: EntryStatus) -> Result<Vec<EntryListing>>;

    /// Single entry joined with author and location
    async fn get_listing(&self, id: i64) -> Result<Option<EntryListing>>;

    /// Entries submitted by a user, newest first
    async fn list_by_creator(&self, user_id: i64) -> Result<Vec<ArchiveEntry>>;
}

pub struct SqlxArchiveEntryRepository {
    pool: DynDatabasePool,
}

impl SqlxArchiveEntryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArchiveEntryRepository> {
        Arc::new(Self::new(pool))
    }
}

const ENTRY_COLUMNS: &str = r#"
    e.id, e.title, e.description, e.entry_type, e.keywords, e.origin_date,
    e.external_links, e.image_url, e.status, e.author_id, e.location_id,
    e.created_by, e.created_at, e.updated_at
"#;

const LISTING_SELECT: &str = r#"
    SELECT
        e.id, e.title, e.description, e.entry_type, e.keywords, e.origin_date,
        e.external_links, e.image_url, e.status, e.author_id, e.location_id,
        e.created_by, e.created_at, e.updated_at,
        a.name AS author_name,
        l.name AS location_name, l.city AS location_city, l.address AS location_address,
        l.latitude AS location_latitude, l.longitude AS location_longitude
    FROM archive_entries e
    LEFT JOIN authors a ON a.id = e.author_id
    LEFT JOIN locations l ON l.id = e.location_id
"#;

#[async_trait]
impl ArchiveEntryRepository for SqlxArchiveEntryRepository {
    async fn create(&self, entry: &NewArchiveEntry) -> Result<ArchiveEntry> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_entry_sqlite(pool, entry).await,
            Backend::Mysql(pool) => create_entry_mysql(pool, entry).await,
        }
    }

    async fn update(&self, id: i64, entry: &NewArchiveEntry) -> Result<Option<ArchiveEntry>> {
        let sql = r#"
            UPDATE archive_entries
            SET title = ?, description = ?, entry_type = ?, keywords = ?, origin_date = ?,
                external_links = ?, image_url = ?, status = ?, author_id = ?, location_id = ?,
                updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        let keywords = encode_list(&entry.keywords);
        let links = encode_list(&entry.external_links);

        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&entry.title)
                .bind(&entry.description)
                .bind(entry.entry_type.to_string())
                .bind(&keywords)
                .bind(&entry.origin_date)
                .bind(&links)
                .bind(&entry.image_url)
                .bind(entry.status.to_string())
                .bind(entry.author_id)
                .bind(entry.location_id)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update archive entry")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&entry.title)
                .bind(&entry.description)
                .bind(entry.entry_type.to_string())
                .bind(&keywords)
                .bind(&entry.origin_date)
                .bind(&links)
                .bind(&entry.image_url)
                .bind(entry.status.to_string())
                .bind(entry.author_id)
                .bind(entry.location_id)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update archive entry")?
                .rows_affected(),
        };

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ArchiveEntry>> {
        let sql = format!("SELECT {} FROM archive_entries e WHERE e.id = ?", ENTRY_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get archive entry by ID")?
                .as_ref()
                .map(row_to_entry_sqlite)
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get archive entry by ID")?
                .as_ref()
                .map(row_to_entry_mysql)
                .transpose(),
        }
    }

    async fn set_status(&self, id: i64, status: EntryStatus) -> Result<bool> {
        let sql = "UPDATE archive_entries SET status = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(status.to_string())
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to set entry status")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(status.to_string())
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to set entry status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM archive_entries WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete archive entry")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete archive entry")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_listings(&self, status: EntryStatus) -> Result<Vec<EntryListing>> {
        let sql = format!(
            "{} WHERE e.status = ? ORDER BY e.created_at DESC, e.id DESC",
            LISTING_SELECT
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(status.to_string())
                .fetch_all(pool)
                .await
                .context("Failed to list archive entries")?
                .iter()
                .map(row_to_listing_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(status.to_string())
                .fetch_all(pool)
                .await
                .context("Failed to list archive entries")?
                .iter()
                .map(row_to_listing_mysql)
                .collect(),
        }
    }

    async fn get_listing(&self, id: i64) -> Result<Option<EntryListing>> {
        let sql = format!("{} WHERE e.id = ?", LISTING_SELECT);
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get archive entry listing")?
                .as_ref()
                .map(row_to_listing_sqlite)
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get archive entry listing")?
                .as_ref()
                .map(row_to_listing_mysql)
                .transpose(),
        }
    }

    async fn list_by_creator(&self, user_id: i64) -> Result<Vec<ArchiveEntry>> {
        let sql = format!(
            "SELECT {} FROM archive_entries e WHERE e.created_by = ? ORDER BY e.created_at DESC, e.id DESC",
            ENTRY_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list entries by creator")?
                .iter()
                .map(row_to_entry_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list entries by creator")?
                .iter()
                .map(row_to_entry_mysql)
                .collect(),
        }
    }
}

fn parse_type_and_status(entry_type: &str, status: &str) -> Result<(EntryType, EntryStatus)> {
    let entry_type = EntryType::from_str(entry_type)
        .with_context(|| format!("Invalid entry type in database: {}", entry_type))?;
    let status = EntryStatus::from_str(status)
        .with_context(|| format!("Invalid entry status in database: {}", status))?;
    Ok((entry_type, status))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_entry_sqlite(pool: &SqlitePool, entry: &NewArchiveEntry) -> Result<ArchiveEntry> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO archive_entries
            (title, description, entry_type, keywords, origin_date, external_links, image_url,
             status, author_id, location_id, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.title)
    .bind(&entry.description)
    .bind(entry.entry_type.to_string())
    .bind(encode_list(&entry.keywords))
    .bind(&entry.origin_date)
    .bind(encode_list(&entry.external_links))
    .bind(&entry.image_url)
    .bind(entry.status.to_string())
    .bind(entry.author_id)
    .bind(entry.location_id)
    .bind(entry.created_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create archive entry")?;

    Ok(new_to_entry(result.last_insert_rowid(), entry, now))
}

fn row_to_entry_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ArchiveEntry> {
    let (entry_type, status) =
        parse_type_and_status(row.get::<&str, _>("entry_type"), row.get::<&str, _>("status"))?;
    let keywords: String = row.get("keywords");
    let links: String = row.get("external_links");

    Ok(ArchiveEntry {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        entry_type,
        keywords: parse_keyword_field(&keywords),
        origin_date: row.get("origin_date"),
        external_links: parse_keyword_field(&links),
        image_url: row.get("image_url"),
        status,
        author_id: row.get("author_id"),
        location_id: row.get("location_id"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_listing_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<EntryListing> {
    let entry = row_to_entry_sqlite(row)?;
    let author = entry.author_id.zip(row.get::<Option<String>, _>("author_name"))
        .map(|(id, name)| AuthorRef { id, name });
    let location = entry.location_id.zip(row.get::<Option<String>, _>("location_name"))
        .map(|(id, name)| Location {
            id,
            name,
            city: row.get("location_city"),
            address: row.get("location_address"),
            latitude: row.get("location_latitude"),
            longitude: row.get("location_longitude"),
        });

    Ok(EntryListing { entry, author, location, cover_url: None })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_entry_mysql(pool: &MySqlPool, entry: &NewArchiveEntry) -> Result<ArchiveEntry> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO archive_entries
            (title, description, entry_type, keywords, origin_date, external_links, image_url,
             status, author_id, location_id, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.title)
    .bind(&entry.description)
    .bind(entry.entry_type.to_string())
    .bind(encode_list(&entry.keywords))
    .bind(&entry.origin_date)
    .bind(encode_list(&entry.external_links))
    .bind(&entry.image_url)
    .bind(entry.status.to_string())
    .bind(entry.author_id)
    .bind(entry.location_id)
    .bind(entry.created_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create archive entry")?;

    Ok(new_to_entry(result.last_insert_id() as i64, entry, now))
}

fn row_to_entry_mysql(row: &sqlx::mysql::MySqlRow) -> Result<ArchiveEntry> {
    let entry_type: String = row.get("entry_type");
    let status: String = row.get("status");
    let (entry_type, status) = parse_type_and_status(&entry_type, &status)?;
    let keywords: String = row.get("keywords");
    let links: String = row.get("external_links");

    Ok(ArchiveEntry {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        entry_type,
        keywords: parse_keyword_field(&keywords),
        origin_date: row.get("origin_date"),
        external_links: parse_keyword_field(&links),
        image_url: row.get("image_url"),
        status,
        author_id: row.get("author_id"),
        location_id: row.get("location_id"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_listing_mysql(row: &sqlx::mysql::MySqlRow) -> Result<EntryListing> {
    let entry = row_to_entry_mysql(row)?;
    let author = entry.author_id.zip(row.get::<Option<String>, _>("author_name"))
        .map(|(id, name)| AuthorRef { id, name });
    let location = entry.location_id.zip(row.get::<Option<String>, _>("location_name"))
        .map(|(id, name)| Location {
            id,
            name,
            city: row.get("location_city"),
            address: row.get("location_address"),
            latitude: row.get("location_latitude"),
            longitude: row.get("location_longitude"),
        });

    Ok(EntryListing { entry, author, location, cover_url: None })
}

fn new_to_entry(id: i64, entry: &NewArchiveEntry, now: chrono::DateTime<Utc>) -> ArchiveEntry {
    ArchiveEntry {
        id,
        title: entry.title.clone(),
        description: entry.description.clone(),
        entry_type: entry.entry_type,
        keywords: entry.keywords.clone(),
        origin_date: entry.origin_date.clone(),
        external_links: entry.external_links.clone(),
        image_url: entry.image_url.clone(),
        status: entry.status,
        author_id: entry.author_id,
        location_id: entry.location_id,
        created_by: entry.created_by,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        AuthorRepository, LocationRepository, SqlxAuthorRepository, SqlxLocationRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewAuthor, NewLocation};

    async fn setup() -> (DynDatabasePool, SqlxArchiveEntryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (pool.clone(), SqlxArchiveEntryRepository::new(pool))
    }

    fn draft(title: &str) -> NewArchiveEntry {
        NewArchiveEntry {
            title: title.to_string(),
            description: "A corner café".into(),
            entry_type: EntryType::Space,
            keywords: vec!["coffee".into(), "1900s".into()],
            origin_date: Some("1905".into()),
            external_links: vec!["https://example.org/sperl".into()],
            image_url: None,
            status: EntryStatus::Submitted,
            author_id: None,
            location_id: None,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_entry() {
        let (_pool, repo) = setup().await;
        let created = repo.create(&draft("Café Sperl")).await.expect("Failed to create entry");

        let found = repo.get_by_id(created.id).await.unwrap().expect("Entry not found");
        assert_eq!(found.title, "Café Sperl");
        assert_eq!(found.keywords, vec!["coffee", "1900s"]);
        assert_eq!(found.external_links, vec!["https://example.org/sperl"]);
        assert_eq!(found.status, EntryStatus::Submitted);
        assert_eq!(found.created_by, None);
    }

    #[tokio::test]
    async fn test_legacy_keyword_text_is_read() {
        let (pool, repo) = setup().await;
        let created = repo.create(&draft("Legacy")).await.unwrap();
        pool.execute(&format!(
            "UPDATE archive_entries SET keywords = 'tiles; stove, kitchen' WHERE id = {}",
            created.id
        ))
        .await
        .unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.keywords, vec!["tiles", "stove", "kitchen"]);
    }

    #[tokio::test]
    async fn test_update_status_and_delete() {
        let (_pool, repo) = setup().await;
        let created = repo.create(&draft("Before")).await.unwrap();

        let mut edit = draft("After");
        edit.created_by = Some(99);
        let updated = repo.update(created.id, &edit).await.unwrap().expect("Entry not found");
        assert_eq!(updated.title, "After");
        assert_eq!(updated.created_by, None);

        assert!(repo.set_status(created.id, EntryStatus::Approved).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().unwrap().is_approved());

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(repo.update(created.id, &edit).await.unwrap().is_none());
        assert!(!repo.set_status(created.id, EntryStatus::Declined).await.unwrap());
    }

    #[tokio::test]
    async fn test_listings_join_author_and_location() {
        let (pool, repo) = setup().await;
        let author = SqlxAuthorRepository::new(pool.clone())
            .create(&NewAuthor { name: "Adolf Loos".into(), ..Default::default() })
            .await
            .unwrap();
        let location = SqlxLocationRepository::new(pool.clone())
            .create(&NewLocation {
                name: "Looshaus".into(),
                city: Some("Wien".into()),
                latitude: Some(48.2087),
                longitude: Some(16.3671),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut with_relations = draft("Looshaus");
        with_relations.author_id = Some(author.id);
        with_relations.location_id = Some(location.id);
        with_relations.status = EntryStatus::Approved;
        let a = repo.create(&with_relations).await.unwrap();

        let mut bare = draft("Bare");
        bare.status = EntryStatus::Approved;
        repo.create(&bare).await.unwrap();
        repo.create(&draft("Pending")).await.unwrap();

        let approved = repo.list_listings(EntryStatus::Approved).await.unwrap();
        assert_eq!(approved.len(), 2);

        let listing = repo.get_listing(a.id).await.unwrap().unwrap();
        assert_eq!(listing.author.as_ref().map(|x| x.name.as_str()), Some("Adolf Loos"));
        assert_eq!(listing.location.as_ref().and_then(|l| l.city.as_deref()), Some("Wien"));
        assert!(listing.cover_url.is_none());

        let pending = repo.list_listings(EntryStatus::Submitted).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].author.is_none());
    }

    #[tokio::test]
    async fn test_list_by_creator() {
        let (pool, repo) = setup().await;
        let user = crate::db::repositories::SqlxUserRepository::new(pool.clone());
        let owner = crate::db::repositories::UserRepository::create(
            &user,
            &crate::models::User::new("o@example.org".into(), None, "h".into(), Default::default()),
        )
        .await
        .unwrap();

        let mut mine = draft("Mine");
        mine.created_by = Some(owner.id);
        repo.create(&mine).await.unwrap();
        repo.create(&draft("Anonymous")).await.unwrap();

        let listed = repo.list_by_creator(owner.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Mine");
    }
}
