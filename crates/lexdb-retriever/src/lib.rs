//! lexdb-retriever
//!
//! Turns query text into a ranked, count- and token-budget-limited list of
//! [`RetrievedContent`]. Retrieval is best effort: any failure is logged and
//! answered with an empty list.

use std::sync::Arc;

use lexdb_core::config::RetrieverSettings;
use lexdb_core::{ContentRetriever, IndexError, RetrievalError, RetrievedContent};
use lexdb_text::{IndexStore, QueryParser, Snapshot};

/// Subtracted from every ranking score before it is exposed, so a document
/// that only matched through the match-all clause reports 0.
pub const SCORE_OFFSET: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieverConfig {
    /// When false, documents without a matching term still compete for the
    /// remaining slots through a match-all clause.
    pub only_matches: bool,
    pub top_n_matches: usize,
    pub max_tokens: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            only_matches: true,
            top_n_matches: 10,
            max_tokens: usize::MAX,
        }
    }
}

impl From<&RetrieverSettings> for RetrieverConfig {
    fn from(s: &RetrieverSettings) -> Self {
        Self {
            only_matches: s.only_matches,
            top_n_matches: s.top_n_matches,
            max_tokens: s.max_tokens,
        }
    }
}

#[derive(Debug, Default)]
pub struct RetrieverBuilder {
    store: Option<Arc<IndexStore>>,
    config: RetrieverConfig,
}

impl RetrieverBuilder {
    pub fn store(mut self, store: Arc<IndexStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: RetrieverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn only_matches(mut self) -> Self {
        self.config.only_matches = true;
        self
    }

    /// Fill up to `top_n_matches` results even with documents that share no term
    /// with the query.
    pub fn match_until_top_n(mut self) -> Self {
        self.config.only_matches = false;
        self
    }

    pub fn top_n_matches(mut self, n: usize) -> Self {
        self.config.top_n_matches = n;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    /// Uses the configured store, or a fresh temporary one when none was given.
    pub fn build(self) -> Result<Retriever, IndexError> {
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(IndexStore::temporary()?),
        };
        let parser = QueryParser::for_content(store.analyzer().clone());
        tracing::debug!(config = ?self.config, dir = %store.dir().display(), "built retriever");
        Ok(Retriever {
            store,
            parser,
            config: self.config,
        })
    }
}

#[derive(Debug)]
pub struct Retriever {
    store: Arc<IndexStore>,
    parser: QueryParser,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn builder(store: Arc<IndexStore>) -> RetrieverBuilder {
        RetrieverBuilder::default().store(store)
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Ranked results for `text` against a fresh snapshot. Never fails; errors
    /// are logged and produce an empty list.
    pub fn retrieve(&self, text: &str) -> Vec<RetrievedContent> {
        match self.try_retrieve(text) {
            Ok(results) => results,
            Err(e) => {
                tracing::info!(query = text, error = %e, "could not query");
                Vec::new()
            }
        }
    }

    pub fn try_retrieve(&self, text: &str) -> Result<Vec<RetrievedContent>, RetrievalError> {
        self.retrieve_in(&self.store.snapshot(), text)
    }

    /// Same pipeline as [`Retriever::retrieve`], against a snapshot the caller holds.
    pub fn retrieve_in(
        &self,
        snapshot: &Snapshot,
        text: &str,
    ) -> Result<Vec<RetrievedContent>, RetrievalError> {
        if text.trim().is_empty() {
            tracing::debug!("empty query text");
            return Ok(Vec::new());
        }
        let top_n = self.config.top_n_matches;
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let parsed = self.parser.parse(text)?;
        let query = if self.config.only_matches {
            parsed.into_query()
        } else {
            parsed.into_query().or_match_all()
        };
        let hits = snapshot.search(&query, top_n);

        let mut used_tokens: usize = 0;
        let mut results = Vec::new();
        for hit in hits.iter().take(top_n) {
            let doc = snapshot
                .document(hit.doc_id)
                .ok_or(RetrievalError::MissingDocument(hit.doc_id))?;
            let doc_tokens = usize::try_from(doc.token_count)
                .map_err(|_| RetrievalError::InvalidTokenCount { doc_id: hit.doc_id })?;
            // a smaller document further down may still fit
            if used_tokens.saturating_add(doc_tokens) > self.config.max_tokens {
                tracing::debug!(
                    doc_id = hit.doc_id,
                    doc_tokens,
                    used_tokens,
                    "skipping document over token budget"
                );
                continue;
            }
            used_tokens = used_tokens.saturating_add(doc_tokens);
            results.push(RetrievedContent {
                text: doc.content.clone(),
                metadata: doc.stored_metadata(),
                score: hit.score - SCORE_OFFSET,
            });
        }
        tracing::debug!(
            hits = hits.len(),
            returned = results.len(),
            used_tokens,
            "retrieved"
        );
        Ok(results)
    }
}

impl ContentRetriever for Retriever {
    fn retrieve(&self, query: &str) -> Vec<RetrievedContent> {
        Retriever::retrieve(self, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexdb_core::Document;

    fn retriever_with(
        docs: &[&str],
        builder: impl FnOnce(RetrieverBuilder) -> RetrieverBuilder,
    ) -> Retriever {
        let retriever = builder(RetrieverBuilder::default()).build().unwrap();
        for doc in docs {
            retriever.store().add(Document::new(*doc)).unwrap();
        }
        retriever
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RetrieverConfig::default();
        assert!(config.only_matches);
        assert_eq!(config.top_n_matches, 10);
        assert_eq!(config.max_tokens, usize::MAX);
        assert_eq!(RetrieverConfig::from(&RetrieverSettings::default()), config);
    }

    #[test]
    fn builder_toggles_mode() {
        let b = RetrieverBuilder::default()
            .match_until_top_n()
            .top_n_matches(3)
            .max_tokens(7);
        assert_eq!(
            b.config,
            RetrieverConfig {
                only_matches: false,
                top_n_matches: 3,
                max_tokens: 7
            }
        );
        assert!(b.only_matches().config.only_matches);
    }

    #[test]
    fn blank_query_is_a_no_op() {
        let retriever = retriever_with(&["some text"], |b| b);
        assert!(retriever.retrieve("").is_empty());
        assert!(retriever.try_retrieve(" \t ").unwrap().is_empty());
    }

    #[test]
    fn syntax_errors_degrade_to_empty() {
        let retriever = retriever_with(&["some text"], |b| b);
        assert!(matches!(retriever.try_retrieve("\"some"), Err(RetrievalError::Parse(_))));
        assert!(retriever.retrieve("\"some").is_empty());
    }

    #[test]
    fn zero_top_n_returns_nothing() {
        let retriever =
            retriever_with(&["some text"], |b| b.top_n_matches(0).match_until_top_n());
        assert!(retriever.retrieve("text").is_empty());
    }

    #[test]
    fn match_all_only_documents_report_zero() {
        let retriever = retriever_with(&["alpha", "beta"], |b| b.match_until_top_n());
        let results = retriever.retrieve("alpha");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "alpha");
        assert!(results[0].score > 0.0);
        assert_eq!(results[1].score, 0.0);
    }
}
