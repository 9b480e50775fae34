//! Content-fetch contract: one read per entity family, each either ready or pending.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::cv::{Contact, CvSnapshot, Education, Experience, Language, Profile, Skill};
use crate::store::{Order, StoreClient, StoreError};

/// Result of a content read: either the full current value, or "not yet available".
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch<T> {
    Ready(T),
    Pending,
}

impl<T> Fetch<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Fetch::Ready(value) => Some(value),
            Fetch::Pending => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to read content file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid content file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read side of the CV content store.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn profile(&self) -> Result<Fetch<Option<Profile>>, ContentError>;
    async fn experiences(&self) -> Result<Fetch<Vec<Experience>>, ContentError>;
    async fn education(&self) -> Result<Fetch<Vec<Education>>, ContentError>;
    async fn languages(&self) -> Result<Fetch<Vec<Language>>, ContentError>;
    async fn skills(&self) -> Result<Fetch<Vec<Skill>>, ContentError>;
    async fn contacts(&self) -> Result<Fetch<Vec<Contact>>, ContentError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Supabase
// ────────────────────────────────────────────────────────────────────────────

/// Reads CV content from the hosted Supabase tables.
pub struct SupabaseContent {
    store: StoreClient,
}

impl SupabaseContent {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }
}

/// Maps transient store failures to `Pending`, everything else to an error.
fn pending_on_transient<T>(result: Result<T, StoreError>, table: &str) -> Result<Fetch<T>, ContentError> {
    match result {
        Ok(value) => Ok(Fetch::Ready(value)),
        Err(e) if e.is_transient() => {
            warn!(table, error = %e, "Content not yet available");
            Ok(Fetch::Pending)
        }
        Err(e) => Err(ContentError::Store(e)),
    }
}

#[async_trait]
impl ContentSource for SupabaseContent {
    async fn profile(&self) -> Result<Fetch<Option<Profile>>, ContentError> {
        pending_on_transient(self.store.select_optional("profile_public").await, "profile_public")
    }

    async fn experiences(&self) -> Result<Fetch<Vec<Experience>>, ContentError> {
        pending_on_transient(
            self.store
                .select("experiences", Some(Order::desc("start_year")))
                .await,
            "experiences",
        )
    }

    async fn education(&self) -> Result<Fetch<Vec<Education>>, ContentError> {
        pending_on_transient(
            self.store
                .select("education", Some(Order::asc("sort_order")))
                .await,
            "education",
        )
    }

    async fn languages(&self) -> Result<Fetch<Vec<Language>>, ContentError> {
        pending_on_transient(
            self.store
                .select("languages", Some(Order::asc("sort_order")))
                .await,
            "languages",
        )
    }

    async fn skills(&self) -> Result<Fetch<Vec<Skill>>, ContentError> {
        pending_on_transient(
            self.store.select("skills", Some(Order::asc("sort_order"))).await,
            "skills",
        )
    }

    async fn contacts(&self) -> Result<Fetch<Vec<Contact>>, ContentError> {
        pending_on_transient(
            self.store
                .select("contact_info", Some(Order::asc("sort_order")))
                .await,
            "contact_info",
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Static content (JSON file or in-memory)
// ────────────────────────────────────────────────────────────────────────────

/// Serves a fixed snapshot. Every read is immediately ready.
pub struct StaticContent {
    snapshot: CvSnapshot,
}

impl StaticContent {
    pub fn new(snapshot: CvSnapshot) -> Self {
        Self { snapshot }
    }

    /// Loads a JSON-encoded `CvSnapshot` from disk.
    pub fn from_json_file(path: &Path) -> Result<Self, ContentError> {
        let raw = std::fs::read(path).map_err(|source| ContentError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: CvSnapshot =
            serde_json::from_slice(&raw).map_err(|source| ContentError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            experiences = snapshot.experiences.len(),
            "Loaded CV content from file"
        );
        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl ContentSource for StaticContent {
    async fn profile(&self) -> Result<Fetch<Option<Profile>>, ContentError> {
        Ok(Fetch::Ready(self.snapshot.profile.clone()))
    }

    async fn experiences(&self) -> Result<Fetch<Vec<Experience>>, ContentError> {
        Ok(Fetch::Ready(self.snapshot.experiences.clone()))
    }

    async fn education(&self) -> Result<Fetch<Vec<Education>>, ContentError> {
        Ok(Fetch::Ready(self.snapshot.education.clone()))
    }

    async fn languages(&self) -> Result<Fetch<Vec<Language>>, ContentError> {
        Ok(Fetch::Ready(self.snapshot.languages.clone()))
    }

    async fn skills(&self) -> Result<Fetch<Vec<Skill>>, ContentError> {
        Ok(Fetch::Ready(self.snapshot.skills.clone()))
    }

    async fn contacts(&self) -> Result<Fetch<Vec<Contact>>, ContentError> {
        Ok(Fetch::Ready(self.snapshot.contacts.clone()))
    }
}
