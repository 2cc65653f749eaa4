// src/extract/fixture.rs
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};

use super::{Extractor, FetchError};
use crate::model::{ItemAttributes, Source};

/// Scriptable in-memory extractor.
///
/// Index responses are queued per source id and consumed one per poll; the
/// last queued response keeps being served once the queue is down to one.
/// Item attributes are looked up by URL; unknown URLs fail to fetch.
pub struct StaticExtractor {
    name: String,
    indexes: Mutex<HashMap<String, VecDeque<Result<BTreeSet<String>, FetchError>>>>,
    items: Mutex<HashMap<String, ItemAttributes>>,
    item_calls: Mutex<Vec<String>>,
}

impl StaticExtractor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Mutex::new(HashMap::new()),
            items: Mutex::new(HashMap::new()),
            item_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_index<I, S>(&self, source_id: &str, urls: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = urls.into_iter().map(Into::into).collect();
        self.indexes
            .lock()
            .entry(source_id.to_string())
            .or_default()
            .push_back(Ok(set));
        self
    }

    pub fn push_index_failure(&self, source_id: &str, reason: &str) -> &Self {
        self.indexes
            .lock()
            .entry(source_id.to_string())
            .or_default()
            .push_back(Err(FetchError::FetchFailed(reason.to_string())));
        self
    }

    pub fn put_item(&self, url: impl Into<String>, attrs: ItemAttributes) -> &Self {
        self.items.lock().insert(url.into(), attrs);
        self
    }

    /// URLs passed to `extract_item`, in call order.
    pub fn item_calls(&self) -> Vec<String> {
        self.item_calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl Extractor for StaticExtractor {
    async fn list_index(&self, source: &Source) -> Result<BTreeSet<String>, FetchError> {
        let mut indexes = self.indexes.lock();
        let queue = indexes
            .get_mut(source.id.as_str())
            .ok_or_else(|| FetchError::FetchFailed(format!("no index for {}", source.id)))?;
        match queue.len() {
            0 => Err(FetchError::FetchFailed("index script exhausted".into())),
            1 => queue[0].clone(),
            _ => queue
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::FetchFailed("index script exhausted".into()))),
        }
    }

    async fn extract_item(&self, url: &str) -> Result<ItemAttributes, FetchError> {
        self.item_calls.lock().push(url.to_string());
        self.items
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::FetchFailed(format!("no page at {url}")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
