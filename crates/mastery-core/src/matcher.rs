//! Resource matching.
//!
//! Indicator references on resources were persisted both as native ids and
//! as strings, in a single-valued field and in a list. Matching therefore
//! runs in two phases: an exact lookup over both encodings, and, only when
//! that finds nothing, a scan of all active resources comparing canonical
//! string forms.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::ids::{parse_lenient, RecordId};
use crate::model::Resource;
use crate::traits::{CatalogSource, ResourceQuery};

/// Which phase produced a match result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Direct,
    Fallback,
}

pub struct ResourceMatcher {
    catalog: Arc<dyn CatalogSource>,
}

impl ResourceMatcher {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }

    /// Resolve raw identifiers to active resources. Malformed ids are dropped.
    pub async fn find_resources_for_indicators<S: AsRef<str> + Sync>(
        &self,
        indicator_ids: &[S],
    ) -> Result<Vec<Resource>> {
        let ids = parse_lenient(indicator_ids);
        self.find_resources(&ids).await
    }

    /// Resolve native identifiers to active resources.
    pub async fn find_resources(&self, indicator_ids: &[RecordId]) -> Result<Vec<Resource>> {
        Ok(self.find_resources_traced(indicator_ids).await?.0)
    }

    /// Like [`find_resources`](Self::find_resources), also reporting the phase used.
    pub async fn find_resources_traced(
        &self,
        indicator_ids: &[RecordId],
    ) -> Result<(Vec<Resource>, MatchPhase)> {
        if indicator_ids.is_empty() {
            return Ok((Vec::new(), MatchPhase::Direct));
        }

        let query = ResourceQuery::for_indicators(indicator_ids);
        let direct: Vec<Resource> = self
            .catalog
            .find_resources(&query)
            .await?
            .into_iter()
            .filter(|r| r.active)
            .collect();
        if !direct.is_empty() {
            tracing::debug!(matched = direct.len(), "direct resource lookup");
            return Ok((direct, MatchPhase::Direct));
        }

        let wanted: HashSet<String> = indicator_ids.iter().map(|id| id.to_string()).collect();
        let fallback: Vec<Resource> = self
            .catalog
            .active_resources()
            .await?
            .into_iter()
            .filter(|r| r.active && references_any(r, &wanted))
            .collect();
        tracing::debug!(
            matched = fallback.len(),
            "direct lookup empty, fell back to canonical scan"
        );
        Ok((fallback, MatchPhase::Fallback))
    }
}

/// Whether `resource` references any of the canonical ids in `wanted`.
pub fn references_any(resource: &Resource, wanted: &HashSet<String>) -> bool {
    resource
        .indicator_refs()
        .any(|r| wanted.contains(&r.canonical()))
}

/// Whether `resource` references `indicator_id` under any encoding.
pub fn references(resource: &Resource, indicator_id: RecordId) -> bool {
    let wanted = indicator_id.to_string();
    resource.indicator_refs().any(|r| r.canonical() == wanted)
}
