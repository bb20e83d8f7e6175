//! # Answer store
//!
//! Durable mapping from question text to `(answer, embedding)`, backed by
//! SQLite via Diesel. The store is the single source of truth shared by all
//! chat sessions; every operation opens its own short-lived connection, so a
//! single [`AnswerStore`] value can be used from concurrent sessions without
//! holding a lock across a request.
//!
//! Duplicate questions are tolerated on purpose: two concurrent resolves of
//! the same miss may both insert, and no unique constraint exists to make
//! one of them fail mid-answer.

use diesel::prelude::*;

use crate::config::establish_connection;
use crate::error::MistError;
use crate::models::QaPair;
use crate::schema::qa_pairs;

/// A stored row eligible for the similarity index: the embedding is kept as
/// raw JSON here and parsed/validated during index construction.
#[derive(Queryable, Debug, Clone)]
pub struct StoredEmbedding {
    pub id: i32,
    pub answer: String,
    pub embedding: String,
}

/// Handle to the `qa_pairs` database.
pub struct AnswerStore {
    db_url: String,
}

impl AnswerStore {
    /// Open the store, creating the `qa_pairs` table when absent.
    ///
    /// # Errors
    /// [`MistError::StoreConnection`] when the database cannot be opened,
    /// [`MistError::Store`] when the schema statement fails.
    pub fn open(db_url: &str) -> Result<Self, MistError> {
        let mut connection = establish_connection(db_url)?;
        diesel::sql_query(
            "CREATE TABLE IF NOT EXISTS qa_pairs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                embedding TEXT
            )",
        )
        .execute(&mut connection)?;

        Ok(Self {
            db_url: db_url.to_string(),
        })
    }

    fn connect(&self) -> Result<SqliteConnection, MistError> {
        establish_connection(&self.db_url)
    }

    /// Append a new Q&A pair, optionally with its question embedding.
    pub fn insert(
        &self,
        question: &str,
        answer: &str,
        embedding: Option<&[f32]>,
    ) -> Result<(), MistError> {
        let serialized = match embedding {
            Some(vector) => {
                Some(serde_json::to_string(vector).map_err(|e| MistError::Data(e.to_string()))?)
            }
            None => None,
        };

        let row = QaPair {
            id: None,
            question: question.to_string(),
            answer: answer.to_string(),
            embedding: serialized,
        };

        let mut connection = self.connect()?;
        diesel::insert_into(qa_pairs::table)
            .values(&row)
            .execute(&mut connection)?;

        Ok(())
    }

    /// All rows carrying a non-empty embedding, as raw JSON. Whether the
    /// JSON actually parses is the index builder's problem.
    pub fn scan_with_embedding(&self) -> Result<Vec<StoredEmbedding>, MistError> {
        let mut connection = self.connect()?;
        let rows = qa_pairs::table
            .filter(qa_pairs::embedding.is_not_null())
            .filter(qa_pairs::embedding.ne(""))
            .select((
                qa_pairs::id,
                qa_pairs::answer,
                qa_pairs::embedding.assume_not_null(),
            ))
            .load::<StoredEmbedding>(&mut connection)?;

        Ok(rows)
    }

    /// First stored answer whose question contains `fragment`,
    /// case-insensitively.
    ///
    /// SQLite `LIKE` is case-insensitive for ASCII, which matches how the
    /// campus Q&A data is written.
    pub fn find_by_substring(&self, fragment: &str) -> Result<Option<String>, MistError> {
        let pattern = format!("%{fragment}%");

        let mut connection = self.connect()?;
        let answer = qa_pairs::table
            .filter(qa_pairs::question.like(pattern))
            .select(qa_pairs::answer)
            .first::<String>(&mut connection)
            .optional()?;

        Ok(answer)
    }

    /// Rows still waiting for an embedding: `(id, question)` pairs.
    pub fn scan_missing_embedding(&self) -> Result<Vec<(i32, String)>, MistError> {
        let mut connection = self.connect()?;
        let rows = qa_pairs::table
            .filter(qa_pairs::embedding.is_null().or(qa_pairs::embedding.eq("")))
            .select((qa_pairs::id, qa_pairs::question))
            .load::<(i32, String)>(&mut connection)?;

        Ok(rows)
    }

    /// Apply one batch of `(id, serialized embedding)` updates inside a
    /// single transaction, bounding commit cost on large backlogs.
    pub fn update_embeddings(&self, batch: &[(i32, String)]) -> Result<(), MistError> {
        let mut connection = self.connect()?;
        connection.transaction::<_, diesel::result::Error, _>(|conn| {
            for (row_id, serialized) in batch {
                diesel::update(qa_pairs::table.find(row_id))
                    .set(qa_pairs::embedding.eq(serialized))
                    .execute(conn)?;
            }
            Ok(())
        })?;

        Ok(())
    }

    /// Number of stored Q&A pairs.
    pub fn count(&self) -> Result<i64, MistError> {
        let mut connection = self.connect()?;
        Ok(qa_pairs::table.count().get_result::<i64>(&mut connection)?)
    }
}
