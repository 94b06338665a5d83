//! # Installation Repository
//!
//! SeaORM-backed [`InstallationRegistry`] over the `installations` table.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::{InstallationRegistry, StoreError};
use crate::models::installation::{ActiveModel as InstallationActiveModel, Column, Entity};
use crate::models::{Installation, NewInstallation};

/// Repository for installation database operations
#[derive(Clone)]
pub struct InstallationRepository {
    db: DatabaseConnection,
}

impl InstallationRepository {
    /// Create a new InstallationRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InstallationRegistry for InstallationRepository {
    async fn create(&self, installation: NewInstallation) -> Result<(), StoreError> {
        let record = InstallationActiveModel {
            id: Set(Uuid::new_v4()),
            installation_id: Set(installation.installation_id),
            owner_id: Set(installation.owner_id),
            authorized_repos: Set(serde_json::to_value(&installation.authorized_repos)?),
            created_at: Set(Utc::now().fixed_offset()),
        };

        record
            .insert(&self.db)
            .await
            .map_err(StoreError::database_error)?;

        Ok(())
    }

    async fn get(&self, installation_id: i64) -> Result<Option<Installation>, StoreError> {
        let model = Entity::find()
            .filter(Column::InstallationId.eq(installation_id))
            .order_by_asc(Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(StoreError::database_error)?;

        Ok(model.map(Installation::try_from).transpose()?)
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Installation>, StoreError> {
        let models = Entity::find()
            .filter(Column::OwnerId.eq(owner_id))
            .order_by_asc(Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(StoreError::database_error)?;

        models
            .into_iter()
            .map(|model| Installation::try_from(model).map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorizedRepo;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, PaginatorTrait};

    async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to test database");
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");
        db
    }

    fn new_installation(installation_id: i64, owner_id: i64, repo: &str) -> NewInstallation {
        NewInstallation {
            installation_id,
            owner_id,
            authorized_repos: vec![AuthorizedRepo {
                id: installation_id * 100,
                full_name: repo.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let repo = InstallationRepository::new(setup_test_db().await);
        repo.create(new_installation(2, 21031067, "Codertocat/Hello-World"))
            .await
            .unwrap();

        let found = repo.get(2).await.unwrap().expect("installation should exist");
        assert_eq!(found.owner_id, 21031067);
        assert_eq!(found.authorized_repos[0].full_name, "Codertocat/Hello-World");
        assert!(repo.get(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_keep_both_rows_and_read_earliest() {
        let db = setup_test_db().await;
        let repo = InstallationRepository::new(db.clone());

        repo.create(new_installation(2, 1, "first/repo")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.create(new_installation(2, 1, "second/repo")).await.unwrap();

        let rows = Entity::find()
            .filter(Column::InstallationId.eq(2))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(rows, 2);

        let found = repo.get(2).await.unwrap().unwrap();
        assert_eq!(found.authorized_repos[0].full_name, "first/repo");
    }

    #[tokio::test]
    async fn list_by_owner_filters_and_orders() {
        let repo = InstallationRepository::new(setup_test_db().await);
        repo.create(new_installation(10, 1, "a/one")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.create(new_installation(11, 2, "b/two")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.create(new_installation(12, 1, "a/three")).await.unwrap();

        let owned = repo.list_by_owner(1).await.unwrap();
        let ids: Vec<i64> = owned.iter().map(|i| i.installation_id).collect();
        assert_eq!(ids, vec![10, 12]);
        assert!(repo.list_by_owner(3).await.unwrap().is_empty());
    }
}
