use crate::types::RetrievedContent;

/// Approximate token counter used to charge documents against a token budget.
///
/// Counts are estimates; the retriever treats them as ground truth.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> anyhow::Result<usize>;
    fn name(&self) -> &str;
}

/// Anything that turns query text into ranked content.
///
/// Implementations never fail: a broken index or bad query yields an empty list.
pub trait ContentRetriever: Send + Sync {
    fn retrieve(&self, query: &str) -> Vec<RetrievedContent>;
}
