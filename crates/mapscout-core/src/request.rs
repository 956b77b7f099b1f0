//! Validated scrape requests shared by the CLI and the HTTP server.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How many listings to collect per search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "count")]
pub enum Target {
    /// Stop as soon as this many listings are visible.
    Bounded(NonZeroUsize),
    /// Keep scrolling until the list stops growing.
    Unbounded,
}

impl Target {
    /// Builds a target from an optional requested count.
    ///
    /// `None` means "take everything available".
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::ZeroTarget`] when `count` is `Some(0)`.
    pub fn from_count(count: Option<usize>) -> Result<Self, RequestError> {
        match count {
            None => Ok(Self::Unbounded),
            Some(n) => NonZeroUsize::new(n)
                .map(Self::Bounded)
                .ok_or(RequestError::ZeroTarget),
        }
    }

    /// Returns the bound, or `None` when unbounded.
    #[must_use]
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::Bounded(n) => Some(n.get()),
            Self::Unbounded => None,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Bounded(n) => write!(f, "{n}"),
            Target::Unbounded => write!(f, "unbounded"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("at least one non-blank search term is required")]
    NoSearchTerms,

    #[error("target count must be at least 1 (omit it to collect everything)")]
    ZeroTarget,
}

/// A batch of search terms to run against one page context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    search_terms: Vec<String>,
    target: Target,
}

impl SearchRequest {
    /// Trims every term and drops blank ones.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::NoSearchTerms`] if nothing usable remains.
    pub fn new<I, S>(terms: I, target: Target) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let search_terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if search_terms.is_empty() {
            return Err(RequestError::NoSearchTerms);
        }

        Ok(Self {
            search_terms,
            target,
        })
    }

    #[must_use]
    pub fn search_terms(&self) -> &[String] {
        &self.search_terms
    }

    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }
}
