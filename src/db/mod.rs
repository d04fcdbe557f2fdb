//! MongoDB persistence layer

pub mod mongo;
pub mod schemas;

pub use mongo::{is_duplicate_key, MongoClient, MongoCollection};
