//! Lookup table from configuration keys to data-source constructors.

use std::sync::Arc;

use nlq_rag::{DataSource, InMemorySource, NlqError, Result};

type Constructor = fn() -> Arc<dyn DataSource>;

/// Every adapter compiled into this build, keyed by `database_type`.
fn adapters() -> Vec<(&'static str, Constructor)> {
    #[allow(unused_mut)]
    let mut table: Vec<(&'static str, Constructor)> = vec![("memory", new_memory as Constructor)];
    #[cfg(feature = "mongodb")]
    table.push(("mongodb", new_mongodb as Constructor));
    #[cfg(feature = "supabase")]
    table.push(("supabase", new_supabase as Constructor));
    #[cfg(feature = "firebase")]
    table.push(("firebase", new_firebase as Constructor));
    #[cfg(feature = "postgres")]
    table.extend([
        ("postgresql", new_postgres as Constructor),
        ("postgres", new_postgres as Constructor),
    ]);
    table
}

fn new_memory() -> Arc<dyn DataSource> {
    Arc::new(InMemorySource::new())
}

#[cfg(feature = "mongodb")]
fn new_mongodb() -> Arc<dyn DataSource> {
    Arc::new(crate::mongo::MongoSource::new())
}

#[cfg(feature = "supabase")]
fn new_supabase() -> Arc<dyn DataSource> {
    Arc::new(crate::supabase::SupabaseSource::new())
}

#[cfg(feature = "firebase")]
fn new_firebase() -> Arc<dyn DataSource> {
    Arc::new(crate::firestore::FirestoreSource::new())
}

#[cfg(feature = "postgres")]
fn new_postgres() -> Arc<dyn DataSource> {
    Arc::new(crate::postgres::PostgresSource::new())
}

/// The keys accepted by [`create_source`], in table order.
pub fn available_sources() -> Vec<&'static str> {
    adapters().into_iter().map(|(key, _)| key).collect()
}

/// Create an unconnected data source for `database_type` (case-insensitive).
///
/// # Errors
///
/// Returns [`NlqError::ConfigError`] naming the available keys if
/// `database_type` is unknown or was compiled out.
pub fn create_source(database_type: &str) -> Result<Arc<dyn DataSource>> {
    let key = database_type.trim().to_ascii_lowercase();
    adapters().into_iter().find(|(name, _)| *name == key).map(|(_, make)| make()).ok_or_else(|| {
        NlqError::ConfigError(format!(
            "Unsupported database type: '{database_type}'. Available types: {}",
            available_sources().join(", ")
        ))
    })
}
