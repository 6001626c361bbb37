//! Per-commit diff retrieval with a size ceiling.
//!
//! Oversized diffs are cut at the ceiling and marked as truncated instead
//! of being rejected, so large initial commits remain usable.

use std::sync::Arc;

use tracing::{debug, warn};

use super::types::{short_sha, Credentials, RepoRef};
use super::CommitSource;
use crate::error::Result;

/// Marker appended to a diff cut at the ceiling.
pub const TRUNCATION_MARKER: &str = "\n... (diff truncated due to size limit)";

/// Patch text for one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBlob {
    /// Full SHA of the commit.
    pub sha: String,
    /// Patch text, possibly truncated and marked.
    pub text: String,
    /// Length of the upstream text in characters.
    pub original_chars: usize,
    /// Whether `text` was cut at the ceiling.
    pub truncated: bool,
}

/// Fetches commit diffs and applies the per-item ceiling.
#[derive(Clone)]
pub struct DiffFetcher {
    source: Arc<dyn CommitSource>,
    ceiling: usize,
}

impl DiffFetcher {
    /// Creates a fetcher with the given ceiling in characters.
    pub fn new(source: Arc<dyn CommitSource>, ceiling: usize) -> Self {
        Self { source, ceiling }
    }

    /// Per-item ceiling in characters.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Fetches the diff of `sha`, truncating it at the ceiling.
    pub async fn fetch_diff(
        &self,
        repo: &RepoRef,
        sha: &str,
        creds: &Credentials,
    ) -> Result<DiffBlob> {
        let raw = self.source.fetch_diff_text(repo, sha, creds).await?;
        let (text, original_chars, truncated) = truncate_diff(raw, self.ceiling);
        if truncated {
            warn!(
                sha = short_sha(sha),
                original_chars,
                ceiling = self.ceiling,
                "Diff exceeds ceiling, truncating"
            );
        } else {
            debug!(sha = short_sha(sha), chars = original_chars, "Fetched diff");
        }
        Ok(DiffBlob {
            sha: sha.to_string(),
            text,
            original_chars,
            truncated,
        })
    }
}

/// Cuts `text` to at most `ceiling` characters plus [`TRUNCATION_MARKER`].
///
/// Returns the resulting text, the original character count and whether a
/// cut happened.
pub(crate) fn truncate_diff(mut text: String, ceiling: usize) -> (String, usize, bool) {
    match text.char_indices().nth(ceiling) {
        Some((cut, _)) => {
            let original_chars = ceiling + text[cut..].chars().count();
            text.truncate(cut);
            text.push_str(TRUNCATION_MARKER);
            (text, original_chars, true)
        }
        None => {
            let original_chars = text.chars().count();
            (text, original_chars, false)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::LensError;
    use crate::test_utils::FakeCommitSource;

    #[test]
    fn short_diff_is_untouched() {
        let (text, chars, truncated) = truncate_diff("+a\n-b\n".to_string(), 100);
        assert_eq!(text, "+a\n-b\n");
        assert_eq!(chars, 6);
        assert!(!truncated);
    }

    #[test]
    fn diff_at_exact_ceiling_is_untouched() {
        let (text, _, truncated) = truncate_diff("x".repeat(10), 10);
        assert_eq!(text.len(), 10);
        assert!(!truncated);
    }

    #[test]
    fn long_diff_is_cut_and_marked() {
        let (text, chars, truncated) = truncate_diff("x".repeat(80_000), 50_000);
        assert!(truncated);
        assert_eq!(chars, 80_000);
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(text.chars().count(), 50_000 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn cut_respects_multibyte_characters() {
        let (text, chars, truncated) = truncate_diff("é".repeat(20), 5);
        assert!(truncated);
        assert_eq!(chars, 20);
        assert!(text.starts_with("ééééé\n"));
    }

    #[tokio::test]
    async fn fetch_diff_applies_ceiling() {
        let source = FakeCommitSource::new(vec!["a1"]).with_diff("a1", "y".repeat(500));
        let fetcher = DiffFetcher::new(Arc::new(source), 100);
        let blob = fetcher
            .fetch_diff(&RepoRef::new("o", "r"), "a1", &Credentials::new("t"))
            .await
            .unwrap();
        assert!(blob.truncated);
        assert_eq!(blob.original_chars, 500);
        assert_eq!(blob.sha, "a1");
    }

    #[tokio::test]
    async fn fetch_diff_propagates_not_found() {
        let source = FakeCommitSource::new(vec!["a1"]);
        let fetcher = DiffFetcher::new(Arc::new(source), 100);
        let err = fetcher
            .fetch_diff(&RepoRef::new("o", "r"), "zz", &Credentials::new("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, LensError::NotFound(_)));
    }
}
