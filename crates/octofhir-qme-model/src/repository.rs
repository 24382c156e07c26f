//! Measure repository abstraction

use crate::definition::MeasureDefinition;
use crate::error::RepositoryError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Source of measure definitions
#[async_trait]
pub trait MeasureRepository: Send + Sync {
    /// Look up a definition.
    ///
    /// With a `sub_id` the match is exact. Without one, a definition that has
    /// no sub-id is preferred, falling back to the first variant stored
    /// under `id`.
    async fn find(
        &self,
        id: &str,
        sub_id: Option<&str>,
    ) -> Result<Arc<MeasureDefinition>, RepositoryError>;

    /// Every stored definition, in insertion order
    async fn all(&self) -> Result<Vec<Arc<MeasureDefinition>>, RepositoryError>;
}

/// Thread-safe repository kept in memory
#[derive(Debug, Default)]
pub struct InMemoryMeasureRepository {
    definitions: RwLock<Vec<Arc<MeasureDefinition>>>,
}

impl InMemoryMeasureRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from definitions, rejecting invalid ones and duplicates
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = MeasureDefinition>,
    ) -> Result<Self, RepositoryError> {
        let repository = Self::new();
        for definition in definitions {
            repository.insert(definition)?;
        }
        Ok(repository)
    }

    /// Store a definition
    pub fn insert(&self, definition: MeasureDefinition) -> Result<(), RepositoryError> {
        definition.validate()?;

        let mut definitions = self.definitions.write();
        if definitions
            .iter()
            .any(|d| d.is(&definition.id, definition.sub_id.as_deref()))
        {
            return Err(RepositoryError::Duplicate {
                key: definition.key().to_string(),
            });
        }
        definitions.push(Arc::new(definition));
        Ok(())
    }

    /// Store every definition of a bundle, tagging them with the bundle id.
    ///
    /// Nothing is stored when any definition is rejected.
    pub fn insert_bundle(
        &self,
        bundle_id: &str,
        definitions: impl IntoIterator<Item = MeasureDefinition>,
    ) -> Result<usize, RepositoryError> {
        let incoming: Vec<MeasureDefinition> = definitions
            .into_iter()
            .map(|mut d| {
                d.bundle = Some(bundle_id.to_string());
                d
            })
            .collect();

        let mut stored = self.definitions.write();
        for (i, definition) in incoming.iter().enumerate() {
            definition.validate()?;
            let key = (definition.id.as_str(), definition.sub_id.as_deref());
            let clashes_stored = stored.iter().any(|d| d.is(key.0, key.1));
            let clashes_bundle = incoming[..i].iter().any(|d| d.is(key.0, key.1));
            if clashes_stored || clashes_bundle {
                return Err(RepositoryError::Duplicate {
                    key: definition.key().to_string(),
                });
            }
        }

        let count = incoming.len();
        stored.extend(incoming.into_iter().map(Arc::new));
        Ok(count)
    }

    /// Remove every definition loaded from a bundle; returns how many were removed
    pub fn remove_bundle(&self, bundle_id: &str) -> usize {
        let mut definitions = self.definitions.write();
        let before = definitions.len();
        definitions.retain(|d| d.bundle.as_deref() != Some(bundle_id));
        before - definitions.len()
    }

    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }
}

#[async_trait]
impl MeasureRepository for InMemoryMeasureRepository {
    async fn find(
        &self,
        id: &str,
        sub_id: Option<&str>,
    ) -> Result<Arc<MeasureDefinition>, RepositoryError> {
        let definitions = self.definitions.read();
        let found = match sub_id {
            Some(_) => definitions.iter().find(|d| d.is(id, sub_id)),
            None => definitions
                .iter()
                .find(|d| d.is(id, None))
                .or_else(|| definitions.iter().find(|d| d.id == id)),
        };
        found
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(id, sub_id))
    }

    async fn all(&self) -> Result<Vec<Arc<MeasureDefinition>>, RepositoryError> {
        Ok(self.definitions.read().clone())
    }
}

#[async_trait]
impl<R: MeasureRepository + ?Sized> MeasureRepository for Arc<R> {
    async fn find(
        &self,
        id: &str,
        sub_id: Option<&str>,
    ) -> Result<Arc<MeasureDefinition>, RepositoryError> {
        (**self).find(id, sub_id).await
    }

    async fn all(&self) -> Result<Vec<Arc<MeasureDefinition>>, RepositoryError> {
        (**self).all().await
    }
}
