//! The fixed list of resources pre-cached at install time.

use std::collections::HashSet;

use crate::cache::key;
use crate::error::{AgentError, Result};

/// Resources of the restaurant-reviews site, cached by default.
const RESTAURANT_REVIEWS: &[&str] = &[
    "/",
    "/css/styles.css",
    "/data/restaurants.json",
    "/img/1.jpg",
    "/img/2.jpg",
    "/img/3.jpg",
    "/img/4.jpg",
    "/img/5.jpg",
    "/img/6.jpg",
    "/img/7.jpg",
    "/img/8.jpg",
    "/img/9.jpg",
    "/img/10.jpg",
    "/js/dbhelper.js",
    "/js/main.js",
    "/js/restaurant_info.js",
    "/index.html",
    "/restaurant.html",
];

/// An ordered, duplicate-free list of request identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    /// Validates and builds a manifest.
    ///
    /// Entries must be non-empty and distinct once fragments are removed;
    /// a duplicate would make a bulk insert ambiguous.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();

        for entry in &entries {
            if entry.trim().is_empty() {
                return Err(AgentError::InvalidRequest(
                    "manifest entries cannot be empty".to_string(),
                ));
            }
            if !seen.insert(key::strip_fragment(entry)) {
                return Err(AgentError::InvalidRequest(format!(
                    "duplicate manifest entry '{}'",
                    entry
                )));
            }
        }

        Ok(Self { entries })
    }

    pub fn restaurant_reviews() -> Self {
        Self {
            entries: RESTAURANT_REVIEWS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
