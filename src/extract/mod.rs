// src/extract/mod.rs
pub mod http;
pub mod fixture;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::model::{ItemAttributes, Source, SourceId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("no extractor registered for source {0}")]
    NoExtractorForSource(SourceId),
    #[error("fetch failed: {0}")]
    FetchFailed(String),
}

/// Site-specific reader of listing indexes and item pages.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Item URLs currently listed on the source's index page.
    async fn list_index(&self, source: &Source) -> Result<BTreeSet<String>, FetchError>;

    /// Full attributes of one item page.
    async fn extract_item(&self, url: &str) -> Result<ItemAttributes, FetchError>;

    fn name(&self) -> &str;
}

/// Named extractor implementations available to the process.
#[derive(Default, Clone)]
pub struct ExtractorRegistry {
    by_name: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) -> &mut Self {
        self.by_name.insert(extractor.name().to_string(), extractor);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.by_name.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Resolve each source's extractor name once, producing the per-source
    /// lookup table the pipeline uses at runtime.
    pub fn resolve<'a, I>(&self, bindings: I) -> SourceExtractors
    where
        I: IntoIterator<Item = (&'a SourceId, &'a str)>,
    {
        let mut table = HashMap::new();
        for (id, name) in bindings {
            match self.get(name) {
                Some(ex) => {
                    table.insert(id.clone(), ex);
                }
                None => {
                    tracing::warn!(source = %id, extractor = name, "unknown extractor; source will not be readable");
                }
            }
        }
        SourceExtractors {
            table: Arc::new(table),
        }
    }
}

/// Per-source extractor table, resolved at startup. Cheap to clone.
#[derive(Clone, Default)]
pub struct SourceExtractors {
    table: Arc<HashMap<SourceId, Arc<dyn Extractor>>>,
}

impl SourceExtractors {
    /// Table where every source maps to the same extractor.
    pub fn uniform<'a, I>(ids: I, extractor: Arc<dyn Extractor>) -> Self
    where
        I: IntoIterator<Item = &'a SourceId>,
    {
        let table = ids
            .into_iter()
            .map(|id| (id.clone(), extractor.clone()))
            .collect();
        Self {
            table: Arc::new(table),
        }
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.table.contains_key(id)
    }

    fn lookup(&self, id: &SourceId) -> Result<&Arc<dyn Extractor>, FetchError> {
        self.table
            .get(id)
            .ok_or_else(|| FetchError::NoExtractorForSource(id.clone()))
    }

    pub async fn list_index(&self, source: &Source) -> Result<BTreeSet<String>, FetchError> {
        self.lookup(&source.id)?.list_index(source).await
    }

    pub async fn extract_item(
        &self,
        source_id: &SourceId,
        url: &str,
    ) -> Result<ItemAttributes, FetchError> {
        self.lookup(source_id)?.extract_item(url).await
    }
}
