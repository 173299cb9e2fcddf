// File and cache management: cached listings, filtering, deletion
// Author: kelexine (https://github.com/kelexine)

use crate::gemini::GeminiClient;
use crate::models::gemini::{CachedContent, GeminiFile};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// A remote resource that can be listed and deleted by name.
pub trait Resource {
    /// Resource name (`files/...`, `cachedContents/...`).
    fn name(&self) -> &str;
    fn display_name(&self) -> Option<&str>;
}

impl Resource for GeminiFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

impl Resource for CachedContent {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

/// Time-stamped snapshot of a remote listing.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    items: Vec<T>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

impl<T> Listing<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            items: Vec::new(),
            fetched_at: None,
            ttl,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.fetched_at
            .map(|at| at.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    /// Mark stale so the next [`Listing::get`] re-fetches.
    pub fn invalidate(&mut self) {
        self.fetched_at = None;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
        self.fetched_at = Some(Instant::now());
    }

    /// Reuse the snapshot while fresh, otherwise fetch.
    pub async fn get<F, Fut>(&mut self, fetch: F) -> &[T]
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<T>>,
    {
        if !self.is_fresh() {
            self.replace(fetch().await);
        } else {
            debug!("Reusing listing of {} item(s)", self.items.len());
        }
        &self.items
    }

    /// Always re-fetch.
    pub async fn refresh<F, Fut>(&mut self, fetch: F) -> &[T]
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<T>>,
    {
        self.replace(fetch().await);
        &self.items
    }
}

/// List files; an error after retries yields an empty list.
pub async fn list_files_or_empty(client: &GeminiClient) -> Vec<GeminiFile> {
    client.list_files().await.unwrap_or_else(|e| {
        error!("Failed to list files: {}", e);
        Vec::new()
    })
}

/// List caches; an error after retries yields an empty list.
pub async fn list_caches_or_empty(client: &GeminiClient) -> Vec<CachedContent> {
    client.list_caches().await.unwrap_or_else(|e| {
        error!("Failed to list caches: {}", e);
        Vec::new()
    })
}

/// Case-insensitive substring match on display name. An empty term keeps everything.
pub fn filter_by_display_name<'a, T: Resource>(items: &'a [T], term: &str) -> Vec<&'a T> {
    let term = term.trim().to_lowercase();
    items
        .iter()
        .filter(|item| {
            term.is_empty()
                || item
                    .display_name()
                    .map(|name| name.to_lowercase().contains(&term))
                    .unwrap_or(false)
        })
        .collect()
}

pub fn names<T: Resource>(items: &[T]) -> Vec<String> {
    items.iter().map(|item| item.name().to_string()).collect()
}

/// Delete every named file, returning the names that failed with the error.
pub async fn delete_files(client: &GeminiClient, names: &[String]) -> Vec<(String, String)> {
    let mut failed = Vec::new();
    for name in names {
        if let Err(e) = client.delete_file(name).await {
            error!("Failed to delete {}: {}", name, e);
            failed.push((name.clone(), e.to_string()));
        }
    }
    failed
}

/// Delete every named cache, returning the names that failed with the error.
pub async fn delete_caches(client: &GeminiClient, names: &[String]) -> Vec<(String, String)> {
    let mut failed = Vec::new();
    for name in names {
        if let Err(e) = client.delete_cache(name).await {
            error!("Failed to delete {}: {}", name, e);
            failed.push((name.clone(), e.to_string()));
        }
    }
    failed
}
