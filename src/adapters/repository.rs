//! In-memory repository adapter. Queries run through the same compiled
//! [`Query`] representation a document store would receive.

use crate::core::query::{compile, matcher, Query};
use crate::core::resources::Repositories;
use crate::core::validation::{application, child, children_group, family, institution, professional};
use crate::domain::model::{
    Application, Child, ChildrenGroup, Educator, Entity, Family, HealthProfessional, Institution,
};
use crate::domain::ports::Repository;
use crate::utils::error::{AccountError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 24 lowercase hex characters, the store id format.
pub fn new_store_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(24);
    id
}

pub struct InMemoryRepository<E: Entity> {
    rows: Arc<RwLock<Vec<E>>>,
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<E: Entity> Clone for InMemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn documents(&self) -> Result<Vec<(Value, E)>> {
        let rows = self.rows.read().await;
        rows.iter()
            .map(|entity| Ok((serde_json::to_value(entity)?, entity.clone())))
            .collect()
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for InMemoryRepository<E> {
    async fn find(&self, query: &Query) -> Result<Vec<E>> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let document = compile::to_document(query);
            tracing::debug!(
                collection = E::COLLECTION,
                filter = %document.filter,
                sort = %document.sort,
                skip = document.skip,
                limit = document.limit,
                "find"
            );
        }
        let rows = self.documents().await?;
        Ok(matcher::compile(query).execute(rows))
    }

    async fn find_one(&self, query: &Query) -> Result<Option<E>> {
        Ok(self.find(query).await?.into_iter().next())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<E>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|entity| entity.id() == Some(id)).cloned())
    }

    async fn count(&self, query: &Query) -> Result<usize> {
        let documents: Vec<Value> = self
            .documents()
            .await?
            .into_iter()
            .map(|(document, _)| document)
            .collect();
        Ok(matcher::compile(query).count(documents.iter()))
    }

    async fn create(&self, mut entity: E) -> Result<E> {
        let mut rows = self.rows.write().await;

        if let Some((field, value)) = entity.unique_key() {
            if rows
                .iter()
                .any(|existing| existing.unique_key().map(|(_, v)| v) == Some(value))
            {
                return Err(AccountError::Conflict {
                    message: "A registration with the same unique data already exists!".to_string(),
                    description: format!(
                        "A record in {} with {} '{}' is already registered.",
                        E::COLLECTION,
                        field,
                        value
                    ),
                });
            }
        }

        if entity.id().is_none() {
            entity.set_id(new_store_id());
        } else if rows.iter().any(|existing| existing.id() == entity.id()) {
            return Err(AccountError::Conflict {
                message: "A registration with the same unique data already exists!".to_string(),
                description: format!("A record in {} with the same id is already registered.", E::COLLECTION),
            });
        }
        entity.stamp_created_at(Utc::now());

        tracing::trace!(collection = E::COLLECTION, id = ?entity.id(), "created");
        rows.push(entity.clone());
        Ok(entity)
    }
}

/// Entities loaded at startup from a JSON fixture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub institutions: Vec<Institution>,
    pub children: Vec<Child>,
    pub families: Vec<Family>,
    pub educators: Vec<Educator>,
    pub health_professionals: Vec<HealthProfessional>,
    pub applications: Vec<Application>,
    pub children_groups: Vec<ChildrenGroup>,
}

impl SeedData {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// One in-memory repository per collection.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    pub children: InMemoryRepository<Child>,
    pub families: InMemoryRepository<Family>,
    pub educators: InMemoryRepository<Educator>,
    pub health_professionals: InMemoryRepository<HealthProfessional>,
    pub applications: InMemoryRepository<Application>,
    pub institutions: InMemoryRepository<Institution>,
    pub children_groups: InMemoryRepository<ChildrenGroup>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            children: Arc::new(self.children.clone()),
            families: Arc::new(self.families.clone()),
            educators: Arc::new(self.educators.clone()),
            health_professionals: Arc::new(self.health_professionals.clone()),
            applications: Arc::new(self.applications.clone()),
            institutions: Arc::new(self.institutions.clone()),
            children_groups: Arc::new(self.children_groups.clone()),
        }
    }

    /// Validates and stores every seeded entity, returning how many were
    /// stored. The first invalid or conflicting entity aborts the load.
    pub async fn load(&self, seed: SeedData) -> Result<usize> {
        let mut stored = 0;

        for entity in seed.institutions {
            institution::validate_create(&entity)?;
            self.institutions.create(entity).await?;
            stored += 1;
        }
        for mut entity in seed.children {
            child::validate_create(&mut entity)?;
            self.children.create(entity).await?;
            stored += 1;
        }
        for entity in seed.families {
            family::validate_create(&entity)?;
            self.families.create(entity).await?;
            stored += 1;
        }
        for entity in seed.educators {
            professional::validate_educator_create(&entity)?;
            self.educators.create(entity).await?;
            stored += 1;
        }
        for entity in seed.health_professionals {
            professional::validate_health_professional_create(&entity)?;
            self.health_professionals.create(entity).await?;
            stored += 1;
        }
        for entity in seed.applications {
            application::validate_create(&entity)?;
            self.applications.create(entity).await?;
            stored += 1;
        }
        for entity in seed.children_groups {
            children_group::validate_create(&entity)?;
            self.children_groups.create(entity).await?;
            stored += 1;
        }

        tracing::info!(stored, "seed data loaded");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::{translate, QueryDefaults};
    use crate::utils::validation::is_store_id;

    fn child(username: &str, gender: &str) -> Child {
        Child {
            username: Some(username.into()),
            password: Some("child123".into()),
            institution: Some("5a62be07de34500146d9c544".into()),
            gender: Some(gender.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_store_id_and_timestamp() {
        let repo = InMemoryRepository::<Child>::new();
        let created = repo.create(child("BR0001", "male")).await.unwrap();
        assert!(is_store_id(created.id.as_deref().unwrap()));
        assert!(created.created_at.is_some());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_username() {
        let repo = InMemoryRepository::<Child>::new();
        repo.create(child("BR0001", "male")).await.unwrap();
        let err = repo.create(child("BR0001", "female")).await.unwrap_err();
        assert!(matches!(err, AccountError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_find_and_count_use_query() {
        let repo = InMemoryRepository::<Child>::new();
        for (name, gender) in [("BR0001", "male"), ("BR0002", "female"), ("BR0003", "male")] {
            repo.create(child(name, gender)).await.unwrap();
        }

        let query = translate("gender=male&sort=-username&limit=1", &QueryDefaults::default()).unwrap();
        let found = repo.find(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username.as_deref(), Some("BR0003"));
        assert_eq!(repo.count(&query).await.unwrap(), 2);

        let first = repo.find_one(&query).await.unwrap().unwrap();
        let by_id = repo.find_by_id(first.id.as_deref().unwrap()).await.unwrap();
        assert_eq!(by_id.unwrap().username, first.username);
    }

    #[tokio::test]
    async fn test_seed_rejects_invalid_entities() {
        let store = InMemoryStore::new();
        let seed = SeedData {
            children: vec![Child {
                username: Some("BR0001".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = store.load(seed).await.unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
        assert!(store.children.is_empty().await);
    }

    #[tokio::test]
    async fn test_find_is_the_same_with_debug_logging() {
        let repo = InMemoryRepository::<Child>::new();
        for (name, gender) in [("BR0001", "male"), ("BR0002", "female"), ("BR0003", "male")] {
            repo.create(child(name, gender)).await.unwrap();
        }
        let query = translate("gender=male&sort=username", &QueryDefaults::default()).unwrap();

        let quiet = repo.find(&query).await.unwrap();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        assert!(tracing::enabled!(tracing::Level::DEBUG));
        let logged = repo.find(&query).await.unwrap();

        assert_eq!(quiet, logged);
        assert_eq!(quiet.len(), 2);
    }
}
