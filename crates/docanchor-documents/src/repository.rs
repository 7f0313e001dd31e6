//! Document persistence.
//!
//! The persistence engine is consumed through [`Repository`], keyed by raw
//! document identifiers. [`InMemoryRepository`] backs tests and local
//! runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use docanchor_core::Identifier;

use crate::error::DocumentError;
use crate::model::Document;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn exists(&self, id: &Identifier) -> bool;

    /// Fails with `NotFound` if nothing is stored under `id`.
    async fn get_by_id(&self, id: &Identifier) -> Result<Document, DocumentError>;

    /// Fails with `AlreadyExists` if `id` is taken.
    async fn create(&self, id: &Identifier, doc: &Document) -> Result<(), DocumentError>;

    /// Fails with `NotFound` if nothing is stored under `id`.
    async fn update(&self, id: &Identifier, doc: &Document) -> Result<(), DocumentError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    docs: RwLock<HashMap<Identifier, Document>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn exists(&self, id: &Identifier) -> bool {
        self.docs.read().contains_key(id)
    }

    async fn get_by_id(&self, id: &Identifier) -> Result<Document, DocumentError> {
        self.docs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))
    }

    async fn create(&self, id: &Identifier, doc: &Document) -> Result<(), DocumentError> {
        let mut docs = self.docs.write();
        if docs.contains_key(id) {
            return Err(DocumentError::AlreadyExists(id.to_string()));
        }
        docs.insert(*id, doc.clone());
        Ok(())
    }

    async fn update(&self, id: &Identifier, doc: &Document) -> Result<(), DocumentError> {
        match self.docs.write().get_mut(id) {
            Some(slot) => {
                *slot = doc.clone();
                Ok(())
            }
            None => Err(DocumentError::NotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{Invoice, InvoiceData};

    fn doc() -> Document {
        Document::Invoice(Invoice::new(InvoiceData::default()))
    }

    #[tokio::test]
    async fn create_then_get() {
        let repo = InMemoryRepository::new();
        let id = Identifier::random();
        assert!(!repo.exists(&id).await);
        repo.create(&id, &doc()).await.unwrap();
        assert!(repo.exists(&id).await);
        assert!(repo.get_by_id(&id).await.is_ok());
    }

    #[tokio::test]
    async fn create_twice_is_rejected() {
        let repo = InMemoryRepository::new();
        let id = Identifier::random();
        repo.create(&id, &doc()).await.unwrap();
        assert!(matches!(
            repo.create(&id, &doc()).await,
            Err(DocumentError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn update_requires_existing() {
        let repo = InMemoryRepository::new();
        let id = Identifier::random();
        assert!(matches!(
            repo.update(&id, &doc()).await,
            Err(DocumentError::NotFound(_))
        ));
        assert!(matches!(
            repo.get_by_id(&id).await,
            Err(DocumentError::NotFound(_))
        ));
    }
}
