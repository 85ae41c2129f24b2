//! Item source abstraction.
//!
//! An item source returns pages of upstream activity ordered
//! newest-first. The poll cycle drives pagination and decides when to
//! stop; the source only fetches.

pub mod graphql;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Item;

// Re-export for convenience
pub use graphql::GraphqlSource;

/// One page of items from the source, newest-first.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Item>,
    pub has_next: bool,
    pub next_cursor: Option<String>,
}

/// Trait for paginated item feeds.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Fetch one page of items, newest-first. `after_cursor` resumes
    /// pagination within the current scan; `None` starts from the top.
    async fn fetch_page(&self, after_cursor: Option<&str>) -> Result<Page>;
}
