//! Shared "current site" selection

use crate::types::DEFAULT_SITE;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Currently selected tenant site, shared between clones
#[derive(Clone, Default)]
pub struct SiteContext {
    current: Arc<ArcSwapOption<String>>,
}

impl SiteContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, site_id: impl Into<String>) {
        self.current.store(Some(Arc::new(site_id.into())));
    }

    pub fn clear(&self) {
        self.current.store(None);
    }

    pub fn current(&self) -> Option<String> {
        self.current.load_full().map(|id| id.as_ref().clone())
    }

    /// The site requests should be scoped to; `None` for unset, empty or `"default"`
    pub fn scoped_site(&self) -> Option<String> {
        self.current()
            .filter(|id| !id.is_empty() && id != DEFAULT_SITE)
    }
}
