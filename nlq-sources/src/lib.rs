//! # nlq-sources
//!
//! Database adapters implementing [`nlq_rag::DataSource`], plus a registry
//! that maps configuration keys to them.
//!
//! ## Features
//!
//! - `mongodb` — MongoDB through the official driver
//! - `postgres` — PostgreSQL through sqlx (keys `postgresql` and `postgres`)
//! - `supabase` — Supabase PostgREST over HTTP
//! - `firebase` — Cloud Firestore REST `runQuery`
//! - `full` — every adapter
//!
//! The in-memory source from `nlq-rag` is always registered as `memory`.
//!
//! ```rust,ignore
//! use nlq_sources::create_source;
//!
//! let source = create_source("postgresql")?;
//! source.connect(&config).await?;
//! ```

pub mod registry;

#[cfg(feature = "firebase")]
pub mod firestore;
#[cfg(feature = "mongodb")]
pub mod mongo;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "supabase")]
pub mod supabase;

pub use registry::{available_sources, create_source};

#[cfg(feature = "firebase")]
pub use firestore::FirestoreSource;
#[cfg(feature = "mongodb")]
pub use mongo::MongoSource;
#[cfg(feature = "postgres")]
pub use postgres::PostgresSource;
#[cfg(feature = "supabase")]
pub use supabase::SupabaseSource;
