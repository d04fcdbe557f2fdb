//! Document schemas for the three persisted tables

pub mod metadata;
pub mod notification;
pub mod reclamation;
pub mod safe_item;

pub use metadata::Metadata;
pub use notification::{NotificationDoc, NOTIFICATION_COLLECTION};
pub use reclamation::{ReclamationDoc, RECLAMATION_COLLECTION};
pub use safe_item::{SafeItemDoc, SAFE_ITEM_COLLECTION};
