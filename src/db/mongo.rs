//! MongoDB client and collection wrapper
//!
//! Collections declare their own indexes via [`IntoIndexes`]; the unique
//! indexes are what make reclamation-pending dedup and notification dedup
//! safe under concurrent writers (a check-then-insert at the application
//! layer alone would race).

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use futures_util::StreamExt;
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::VerdictError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// True when the error is a unique-index violation (duplicate key)
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == 11000
    )
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, VerdictError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| VerdictError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        // Verify connection with timeout
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| VerdictError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, VerdictError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, VerdictError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), VerdictError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| VerdictError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps.
    ///
    /// A unique-index violation surfaces as `Ok(None)` so callers can treat
    /// duplicates as a first-class outcome rather than an error.
    pub async fn insert_unique(&self, mut item: T) -> Result<Option<ObjectId>, VerdictError> {
        let metadata = item.mut_metadata();
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        match self.inner.insert_one(item).await {
            Ok(result) => result
                .inserted_id
                .as_object_id()
                .map(Some)
                .ok_or_else(|| VerdictError::Database("Failed to get inserted ID".into())),
            Err(e) if is_duplicate_key(&e) => Ok(None),
            Err(e) => Err(VerdictError::Database(format!("Insert failed: {}", e))),
        }
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, VerdictError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| VerdictError::Database(format!("Find failed: {}", e)))
    }

    /// Find many documents by filter, in insertion order (ascending `_id`)
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, VerdictError> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();

        let cursor = self
            .inner
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| VerdictError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Atomically find and update one document, returning the post-update
    /// document. With `upsert`, inserts when no document matches.
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<Option<T>, VerdictError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .build();

        self.inner
            .find_one_and_update(filter, update)
            .with_options(options)
            .await
            .map_err(|e| VerdictError::Database(format!("Update failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running MongoDB instance;
    // the in-memory store implementations cover the dedup semantics.
}
