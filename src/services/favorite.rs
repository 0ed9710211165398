//! Favorites

use crate::db::repositories::{ArchiveEntryRepository, FavoriteRepository};
use crate::models::{EntryStatus, FavoriteWithEntry, User};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum FavoriteServiceError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct FavoriteService {
    repo: Arc<dyn FavoriteRepository>,
    entry_repo: Arc<dyn ArchiveEntryRepository>,
}

impl FavoriteService {
    pub fn new(
        repo: Arc<dyn FavoriteRepository>,
        entry_repo: Arc<dyn ArchiveEntryRepository>,
    ) -> Self {
        Self { repo, entry_repo }
    }

    /// Check that `entry_id` names an entry the user may see.
    ///
    /// Entries that are not approved count as missing unless the user
    /// submitted them or is an admin, so hidden ids are not revealed.
    async fn ensure_visible(&self, user: &User, entry_id: i64) -> Result<(), FavoriteServiceError> {
        let entry = self
            .entry_repo
            .get_by_id(entry_id)
            .await
            .context("Failed to get entry")?;
        match entry {
            Some(entry)
                if entry.status == EntryStatus::Approved || user.can_manage(entry.created_by) =>
            {
                Ok(())
            }
            _ => Err(FavoriteServiceError::NotFound(entry_id.to_string())),
        }
    }

    /// Mark an entry as a favorite of `user`.
    ///
    /// # Arguments
    /// * `user` - The logged-in user
    /// * `entry_id` - An entry visible to that user
    ///
    /// # Returns
    /// `Ok(())` also when the favorite already existed, `NotFound` for
    /// missing or hidden entries.
    pub async fn add(&self, user: &User, entry_id: i64) -> Result<(), FavoriteServiceError> {
        self.ensure_visible(user, entry_id).await?;
        self.repo
            .add(user.id, entry_id)
            .await
            .context("Failed to add favorite")?;
        Ok(())
    }

    /// Returns whether a favorite was removed
    pub async fn remove(&self, user_id: i64, entry_id: i64) -> Result<bool, FavoriteServiceError> {
        Ok(self
            .repo
            .remove(user_id, entry_id)
            .await
            .context("Failed to remove favorite")?)
    }

    /// Flip the favorite state; returns whether the entry is now a favorite
    pub async fn toggle(&self, user: &User, entry_id: i64) -> Result<bool, FavoriteServiceError> {
        if self.is_favorite(user.id, entry_id).await? {
            self.remove(user.id, entry_id).await?;
            Ok(false)
        } else {
            self.add(user, entry_id).await?;
            Ok(true)
        }
    }

    pub async fn is_favorite(&self, user_id: i64, entry_id: i64) -> Result<bool, FavoriteServiceError> {
        Ok(self
            .repo
            .exists(user_id, entry_id)
            .await
            .context("Failed to check favorite")?)
    }

    /// List a user's favorites, newest first.
    ///
    /// Favorites whose entry has since left the approved state are skipped
    /// unless the user submitted the entry or is an admin.
    pub async fn list(&self, user: &User) -> Result<Vec<FavoriteWithEntry>, FavoriteServiceError> {
        Ok(self
            .repo
            .list_by_user(user.id, user.is_admin())
            .await
            .context("Failed to list favorites")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxArchiveEntryRepository, SqlxFavoriteRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{EntryType, NewArchiveEntry, UserRole};

    fn new_entry(title: &str, status: EntryStatus, created_by: Option<i64>) -> NewArchiveEntry {
        NewArchiveEntry {
            title: title.into(),
            description: "Cyclic elevator".into(),
            entry_type: EntryType::Artifact,
            keywords: vec![],
            origin_date: Some("1911".into()),
            external_links: vec![],
            image_url: None,
            status,
            author_id: None,
            location_id: None,
            created_by,
        }
    }

    async fn setup() -> (DynDatabasePool, FavoriteService, User, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("fav@example.org".into(), None, "h".into(), UserRole::User))
            .await
            .unwrap();
        let entries = SqlxArchiveEntryRepository::boxed(pool.clone());
        let entry = entries
            .create(&new_entry("Paternoster", EntryStatus::Approved, None))
            .await
            .unwrap();

        let service = FavoriteService::new(SqlxFavoriteRepository::boxed(pool.clone()), entries);
        (pool, service, user, entry.id)
    }

    async fn rows_for(pool: &DynDatabasePool, user_id: i64, entry_id: i64) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM favorites WHERE user_id = ? AND archive_entry_id = ?",
        )
        .bind(user_id)
        .bind(entry_id)
        .fetch_one(pool.as_sqlite().unwrap())
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_toggle_twice_leaves_no_row() {
        let (pool, service, user, entry_id) = setup().await;

        assert!(service.toggle(&user, entry_id).await.unwrap());
        assert_eq!(rows_for(&pool, user.id, entry_id).await, 1);

        assert!(!service.toggle(&user, entry_id).await.unwrap());
        assert_eq!(rows_for(&pool, user.id, entry_id).await, 0);
    }

    #[tokio::test]
    async fn test_add_list_remove() {
        let (_pool, service, user, entry_id) = setup().await;

        service.add(&user, entry_id).await.unwrap();
        service.add(&user, entry_id).await.unwrap();
        assert!(service.is_favorite(user.id, entry_id).await.unwrap());

        let listed = service.list(&user).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].entry.title, "Paternoster");

        assert!(service.remove(user.id, entry_id).await.unwrap());
        assert!(!service.remove(user.id, entry_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_entry_cannot_be_favorited() {
        let (_pool, service, user, _) = setup().await;
        assert!(matches!(
            service.toggle(&user, 777).await,
            Err(FavoriteServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hidden_entry_cannot_be_favorited() {
        let (pool, service, user, _) = setup().await;
        let entries = SqlxArchiveEntryRepository::new(pool.clone());
        let pending = entries
            .create(&new_entry("Secret pending", EntryStatus::Submitted, None))
            .await
            .unwrap();

        assert!(matches!(
            service.add(&user, pending.id).await,
            Err(FavoriteServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.toggle(&user, pending.id).await,
            Err(FavoriteServiceError::NotFound(_))
        ));
        assert_eq!(rows_for(&pool, user.id, pending.id).await, 0);
        assert!(service.list(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_own_pending_entry_can_be_favorited() {
        let (pool, service, user, _) = setup().await;
        let own = SqlxArchiveEntryRepository::new(pool.clone())
            .create(&new_entry("My draft", EntryStatus::Submitted, Some(user.id)))
            .await
            .unwrap();

        service.add(&user, own.id).await.unwrap();
        let titles: Vec<_> = service
            .list(&user)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.entry.title)
            .collect();
        assert_eq!(titles, vec!["My draft"]);
    }

    #[tokio::test]
    async fn test_declined_favorite_drops_out_of_list() {
        let (pool, service, user, entry_id) = setup().await;
        service.add(&user, entry_id).await.unwrap();

        SqlxArchiveEntryRepository::new(pool.clone())
            .set_status(entry_id, EntryStatus::Declined)
            .await
            .unwrap();
        assert!(service.list(&user).await.unwrap().is_empty());
    }
}
