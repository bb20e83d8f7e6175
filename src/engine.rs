//! # Retrieval engine
//!
//! Orchestrates the answer cache. A question flows through four steps:
//!
//! 1. **Embed** the live question. A provider failure propagates to the
//!    caller; without a query vector there is nothing sensible to cache.
//! 2. **Semantic match**: build (or reuse, see below) the similarity index
//!    and search for the closest stored question. A score at or above the
//!    configured threshold returns the stored answer outright: no generator
//!    call, no store mutation.
//! 3. **Substring fallback**: a case-insensitive containment lookup over the
//!    stored questions. Also read-only.
//! 4. **Generate & persist**: ask the answer generator, write the new pair
//!    back (reusing the step-1 embedding, so the row is immediately
//!    indexable), and return the fresh answer. Persistence is best effort;
//!    a store failure here is logged, not surfaced.
//!
//! ## Index reuse
//! Rebuilding the index is a full table scan and the dominant per-query
//! cost. With `index_ttl` unset the engine rebuilds on every request. With a
//! TTL the built index is cached for that window and invalidated on every
//! local write; a pair written by *another* process can stay semantically
//! undiscoverable for up to the TTL (it is still reachable through the
//! substring fallback).
//!
//! ## Concurrency
//! The engine holds no lock across a request. Concurrent resolves of the
//! same missed question may both reach step 4 and insert duplicate rows;
//! the store tolerates that by design.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::MistError;
use crate::generator::AnswerGenerator;
use crate::index::{AnswerIndex, l2_normalize};
use crate::store::AnswerStore;

/// Where a resolved answer came from.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerSource {
    /// Reused after a similarity-threshold hit.
    Semantic { score: f32 },
    /// Reused after the case-insensitive containment lookup.
    Substring,
    /// Freshly generated on a full cache miss.
    Generated,
}

/// A resolved answer plus its provenance.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub answer: String,
    pub source: AnswerSource,
}

struct CachedIndex {
    built_at: Instant,
    index: Option<Arc<AnswerIndex>>,
}

/// The retrieval engine shared by all chat sessions of one process.
pub struct RetrievalEngine {
    store: AnswerStore,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn AnswerGenerator>,
    threshold: f32,
    index_ttl: Option<Duration>,
    cache: Mutex<Option<CachedIndex>>,
}

impl RetrievalEngine {
    pub fn new(
        store: AnswerStore,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn AnswerGenerator>,
        threshold: f32,
        index_ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            threshold,
            index_ttl,
            cache: Mutex::new(None),
        }
    }

    /// Answer `question`, preferring cached material over generation.
    ///
    /// # Errors
    /// - [`MistError::Provider`] when the live question cannot be embedded.
    /// - [`MistError::Store`] when the substring lookup fails (a store
    ///   failure while *reading historical embeddings* instead degrades to
    ///   "no index", see [`AnswerIndex::build`]).
    /// - [`MistError::Generator`] when generation itself fails.
    ///
    /// A failure to persist a freshly generated answer is logged and the
    /// answer is still returned.
    pub async fn resolve(&self, question: &str) -> Result<Resolution, MistError> {
        let embedding = self.embedder.embed(question).await?;

        if let Some(index) = self.current_index() {
            match l2_normalize(&embedding) {
                Some(query) => {
                    if let Some(hit) = index.search(&query) {
                        debug!(
                            score = hit.score,
                            threshold = self.threshold,
                            "best semantic match"
                        );
                        if hit.score >= self.threshold {
                            return Ok(Resolution {
                                answer: hit.answer,
                                source: AnswerSource::Semantic { score: hit.score },
                            });
                        }
                    }
                }
                None => debug!("query embedding has zero norm, skipping semantic match"),
            }
        }

        if let Some(answer) = self.store.find_by_substring(question)? {
            return Ok(Resolution {
                answer,
                source: AnswerSource::Substring,
            });
        }

        let answer = self.generator.generate(question).await?;

        // Best effort: the user still gets the answer if persistence fails.
        match self.store.insert(question, &answer, Some(&embedding)) {
            Ok(()) => self.invalidate_index(),
            Err(err) => warn!("failed to persist generated answer: {err}"),
        }

        Ok(Resolution {
            answer,
            source: AnswerSource::Generated,
        })
    }

    /// Embed eagerly and insert a Q&A pair (the seeding path).
    ///
    /// Unlike step 4 of [`resolve`](Self::resolve), a store failure here is
    /// surfaced: a seeding tool wants to know its write was lost.
    pub async fn add_pair(&self, question: &str, answer: &str) -> Result<(), MistError> {
        let embedding = self.embedder.embed(question).await?;
        self.store.insert(question, answer, Some(&embedding))?;
        self.invalidate_index();
        Ok(())
    }

    /// Compute and persist embeddings for rows that lack one, committing one
    /// batch per transaction. Returns the number of rows updated.
    ///
    /// Re-entrant: only rows missing an embedding are targeted, so running
    /// it twice neither duplicates nor corrupts anything.
    pub async fn backfill(&self, batch_size: usize) -> Result<usize, MistError> {
        let batch_size = batch_size.max(1);
        let missing = self.store.scan_missing_embedding()?;
        let total = missing.len();

        for chunk in missing.chunks(batch_size) {
            let mut updates = Vec::with_capacity(chunk.len());
            for (row_id, question) in chunk {
                let embedding = self.embedder.embed(question).await?;
                let serialized = serde_json::to_string(&embedding)
                    .map_err(|e| MistError::Data(e.to_string()))?;
                updates.push((*row_id, serialized));
            }
            self.store.update_embeddings(&updates)?;
            debug!(rows = updates.len(), "committed backfill batch");
        }

        if total > 0 {
            self.invalidate_index();
        }
        Ok(total)
    }

    /// Build or reuse the similarity index per the configured policy.
    ///
    /// The cache lock is never held through the table scan; two racing
    /// rebuilds are cheaper than serializing every resolve behind one.
    fn current_index(&self) -> Option<Arc<AnswerIndex>> {
        let Some(ttl) = self.index_ttl else {
            return self.build_index();
        };

        {
            let slot = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(cached) = slot.as_ref() {
                if cached.built_at.elapsed() < ttl {
                    return cached.index.clone();
                }
            }
        }

        let index = self.build_index();
        let mut slot = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(CachedIndex {
            built_at: Instant::now(),
            index: index.clone(),
        });

        index
    }

    fn build_index(&self) -> Option<Arc<AnswerIndex>> {
        let rows = match self.store.scan_with_embedding() {
            Ok(rows) => rows,
            Err(err) => {
                warn!("could not scan stored embeddings: {err}");
                return None;
            }
        };

        AnswerIndex::build(&rows).map(Arc::new)
    }

    fn invalidate_index(&self) {
        if self.index_ttl.is_some() {
            let mut slot = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            *slot = None;
        }
    }
}
