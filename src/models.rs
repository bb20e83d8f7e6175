//! # Database models
//!
//! Data structures that map to the `qa_pairs` SQLite table via **Diesel**
//! (see `crate::schema`). The answer store exclusively owns these rows: the
//! retrieval engine only reads snapshots and appends new pairs, and the
//! backfill pass fills in missing embeddings.

use diesel::prelude::*;

/// One cached question/answer pair.
///
/// ### Table
/// - `qa_pairs`
///
/// ### Notes
/// - `embedding` holds the question's embedding as a JSON array of floats,
///   or `NULL` when it has not been computed yet (bulk-imported rows). The
///   backfill pass fills it in later; rows are never deleted by this crate.
/// - `id` is optional for `Insertable` convenience; Diesel assigns it on
///   insert.
#[derive(Queryable, Insertable, Debug, Selectable, Clone)]
#[diesel(table_name = crate::schema::qa_pairs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QaPair {
    /// Auto-increment primary key (set by the DB on insert).
    #[diesel(deserialize_as = i32)]
    pub id: Option<i32>,
    /// The question exactly as it was asked.
    pub question: String,
    /// The answer served for this question.
    pub answer: String,
    /// JSON-encoded embedding of `question`, if computed.
    pub embedding: Option<String>,
}
