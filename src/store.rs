//! Persistence store for timezone cards, contacts, and documents.
//!
//! The orchestrator only speaks to the [`Repository`] trait; any storage
//! engine can sit behind it without changing the workflow contracts. Every
//! method is asynchronous and returns copies, never live references.
//! [`MemoryStore`] is the built-in backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::types::{Contact, Document, TimezoneCard};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert violated a uniqueness invariant.
    #[error("{0}")]
    Duplicate(String),

    /// The backend itself failed.
    #[error("storage backend: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_timezone_cards(&self) -> Result<Vec<TimezoneCard>, StoreError>;
    async fn add_timezone_card(&self, card: TimezoneCard) -> Result<TimezoneCard, StoreError>;
    async fn delete_timezone_card(&self, id: &str) -> Result<(), StoreError>;

    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError>;
    /// Creates the contact, enforcing case-insensitive email uniqueness.
    async fn add_contact(&self, name: &str, email: &str) -> Result<Contact, StoreError>;
    async fn delete_contact(&self, id: &str) -> Result<(), StoreError>;

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;
    /// Documents are append-only; there is no delete.
    async fn add_document(&self, document: Document) -> Result<Document, StoreError>;
}

/// In-memory store. State is lost on shutdown, which matches the contract of
/// the entities it holds — durable backends implement [`Repository`] instead.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cards: Mutex<Vec<TimezoneCard>>,
    contacts: Mutex<Vec<Contact>>,
    documents: Mutex<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn list_timezone_cards(&self) -> Result<Vec<TimezoneCard>, StoreError> {
        Ok(self.cards.lock().clone())
    }

    async fn add_timezone_card(&self, card: TimezoneCard) -> Result<TimezoneCard, StoreError> {
        self.cards.lock().push(card.clone());
        Ok(card)
    }

    async fn delete_timezone_card(&self, id: &str) -> Result<(), StoreError> {
        self.cards.lock().retain(|card| card.id != id);
        Ok(())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        Ok(self.contacts.lock().clone())
    }

    async fn add_contact(&self, name: &str, email: &str) -> Result<Contact, StoreError> {
        let mut contacts = self.contacts.lock();
        if contacts
            .iter()
            .any(|c| c.email.eq_ignore_ascii_case(email))
        {
            return Err(StoreError::Duplicate(
                "a contact with this email already exists".to_string(),
            ));
        }

        let contact = Contact {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
        };
        contacts.push(contact.clone());
        Ok(contact)
    }

    async fn delete_contact(&self, id: &str) -> Result<(), StoreError> {
        self.contacts.lock().retain(|contact| contact.id != id);
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.documents.lock().clone())
    }

    async fn add_document(&self, document: Document) -> Result<Document, StoreError> {
        self.documents.lock().push(document.clone());
        Ok(document)
    }
}
