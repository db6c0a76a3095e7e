//! Database-backed store implementations.

pub mod document_repo;

pub use document_repo::PgDocumentStore;
