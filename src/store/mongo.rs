//! MongoDB-backed store implementations
//!
//! Dedup rides on the unique indexes each schema declares: the pending
//! reclamation gate is a partial unique index over unprocessed rows, the
//! notification gate a unique index on (details_hash, threat_type). The
//! confirm transition is a single `find_one_and_update` filtered on
//! `processed: false`, so exactly one of two racing confirms wins.

use async_trait::async_trait;
use bson::{doc, DateTime};
use tracing::debug;

use crate::db::schemas::{
    NotificationDoc, ReclamationDoc, SafeItemDoc, NOTIFICATION_COLLECTION, RECLAMATION_COLLECTION,
    SAFE_ITEM_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::store::{NotificationStore, ReclamationStore, SafeItemRegistry};
use crate::types::{Result, VerdictError};

/// MongoDB-backed reclamation store
pub struct MongoReclamationStore {
    collection: MongoCollection<ReclamationDoc>,
}

impl MongoReclamationStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(RECLAMATION_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl ReclamationStore for MongoReclamationStore {
    async fn insert_pending(&self, rec: ReclamationDoc) -> Result<ReclamationDoc> {
        let item_hash = rec.item_hash.clone();
        let threat_type = rec.threat_type.clone();
        let mut stored = rec;

        // The partial unique index on unprocessed (item_hash, threat_type)
        // turns a concurrent duplicate submission into a duplicate-key error
        match self.collection.insert_unique(stored.clone()).await? {
            Some(oid) => {
                stored._id = Some(oid);
                debug!(id = %stored.id, threat_type = %threat_type, "Reclamation stored");
                Ok(stored)
            }
            None => Err(VerdictError::DuplicatePending(format!(
                "{}/{}",
                item_hash, threat_type
            ))),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ReclamationDoc>> {
        self.collection.find_one(doc! { "id": id }).await
    }

    async fn list_pending(&self) -> Result<Vec<ReclamationDoc>> {
        self.collection.find_many(doc! { "processed": false }).await
    }

    async fn mark_processed(&self, id: &str, safe: bool) -> Result<Option<ReclamationDoc>> {
        self.collection
            .find_one_and_update(
                doc! { "id": id, "processed": false },
                doc! {
                    "$set": {
                        "processed": true,
                        "safe": safe,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
                false,
            )
            .await
    }
}

/// MongoDB-backed safe-item registry
pub struct MongoSafeItemRegistry {
    collection: MongoCollection<SafeItemDoc>,
}

impl MongoSafeItemRegistry {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(SAFE_ITEM_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl SafeItemRegistry for MongoSafeItemRegistry {
    async fn upsert(
        &self,
        item_hash: &str,
        threat_type: &str,
        is_safe: bool,
        admin_confirmed: bool,
    ) -> Result<SafeItemDoc> {
        let template = SafeItemDoc::new(
            item_hash.to_string(),
            threat_type.to_string(),
            is_safe,
            admin_confirmed,
        );

        // Atomic upsert keyed on the unique (item_hash, threat_type) index;
        // $setOnInsert fields only land when a new row is created
        let updated = self
            .collection
            .find_one_and_update(
                doc! { "item_hash": item_hash, "threat_type": threat_type },
                doc! {
                    "$set": {
                        "is_safe": is_safe,
                        "admin_confirmed": admin_confirmed,
                        "metadata.updated_at": DateTime::now(),
                    },
                    "$setOnInsert": {
                        "id": &template.id,
                        "item_hash": item_hash,
                        "threat_type": threat_type,
                        "metadata.created_at": DateTime::now(),
                    }
                },
                true,
            )
            .await?;

        updated.ok_or_else(|| {
            VerdictError::Database("Upsert returned no document".to_string())
        })
    }

    async fn lookup(&self, item_hash: &str, threat_type: &str) -> Result<Option<SafeItemDoc>> {
        self.collection
            .find_one(doc! { "item_hash": item_hash, "threat_type": threat_type })
            .await
    }
}

/// MongoDB-backed notification store
pub struct MongoNotificationStore {
    collection: MongoCollection<NotificationDoc>,
}

impl MongoNotificationStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(NOTIFICATION_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl NotificationStore for MongoNotificationStore {
    async fn insert(&self, notification: NotificationDoc) -> Result<bool> {
        let details_hash = notification.details_hash.clone();
        let threat_type = notification.threat_type.clone();

        match self.collection.insert_unique(notification).await? {
            Some(_) => Ok(true),
            None => {
                debug!(
                    details_hash = %details_hash,
                    threat_type = %threat_type,
                    "Duplicate notification skipped"
                );
                Ok(false)
            }
        }
    }

    async fn list_unresolved(&self) -> Result<Vec<NotificationDoc>> {
        self.collection
            .find_many(doc! { "is_safe": false, "admin_confirmed": false })
            .await
    }

    async fn list_all(&self) -> Result<Vec<NotificationDoc>> {
        self.collection.find_many(doc! {}).await
    }
}
