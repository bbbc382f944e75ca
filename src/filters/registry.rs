use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FilterError, Result};
use crate::filters::{Filter, InvertFilter, MonochromeFilter, PassthroughFilter, VignetteFilter};

type FilterFactory = Box<dyn Fn() -> Arc<dyn Filter> + Send + Sync>;

/// Registry of available filters
///
/// Filters are registered by name with a factory and looked up when the
/// pipeline is built.
pub struct FilterRegistry {
    filters: HashMap<String, FilterFactory>,
}

impl FilterRegistry {
    /// Create a new registry with all built-in filters
    pub fn new() -> Self {
        let mut registry = Self {
            filters: HashMap::new(),
        };

        registry.register_builtin_filters();
        registry
    }

    fn register_builtin_filters(&mut self) {
        self.register("none", || Arc::new(PassthroughFilter));
        self.register("monochrome", || Arc::new(MonochromeFilter::new()));
        self.register("sepia", || Arc::new(MonochromeFilter::sepia()));
        self.register("vignette", || Arc::new(VignetteFilter::new()));
        self.register("invert", || Arc::new(InvertFilter));
    }

    /// Register a custom filter, replacing any filter with the same name
    pub fn register<N, F>(&mut self, name: N, factory: F)
    where
        N: Into<String>,
        F: Fn() -> Arc<dyn Filter> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Box::new(factory));
    }

    /// Get a filter by name
    pub fn get_filter(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(name).map(|factory| factory())
    }

    /// Get a filter by name, failing with [`FilterError::NotFound`]
    pub fn require(&self, name: &str) -> Result<Arc<dyn Filter>> {
        self.get_filter(name)
            .ok_or_else(|| FilterError::NotFound { name: name.to_string() }.into())
    }

    /// All registered names, sorted
    pub fn available_filters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.filters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
