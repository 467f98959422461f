//! Entry points bound to a metadata catalog and an executor.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::executor::SqlExecutor;
use crate::facet::{build_config, build_queries, execute_batch, normalize, FacetConfig, FacetResult, DEFAULT_MAX_VALUES};
use crate::filter::{Filters, PublicationState};
use crate::group_by;
use crate::schema::MetadataCatalog;
use crate::value::RawRow;

pub use crate::group_by::{GroupByCountParams, GroupByParams};

/// Environment variable read by [`EngineOptions::from_env`].
pub const MAX_VALUES_ENV: &str = "FACET_MAX_VALUES";

/// Host-level knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// List facets with more distinct values than this are dropped.
    pub max_values: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_values: DEFAULT_MAX_VALUES,
        }
    }
}

impl EngineOptions {
    pub fn with_max_values(mut self, max_values: usize) -> Self {
        self.max_values = max_values;
        self
    }

    /// Defaults overridden by `FACET_MAX_VALUES` when it holds a valid number.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(raw) = std::env::var(MAX_VALUES_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(max_values) => options.max_values = max_values,
                Err(_) => debug!(value = %raw, "ignoring invalid {}", MAX_VALUES_ENV),
            }
        }
        options
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterParams {
    pub filters: Option<Filters>,
    /// Restricts derived facets to these attributes.
    pub fields: Option<Vec<String>>,
    pub publication_state: Option<PublicationState>,
    /// Per-call override of [`EngineOptions::max_values`].
    pub max_values: Option<usize>,
}

/// Faceted aggregation and group-by queries over catalogued entities.
#[derive(Clone)]
pub struct FacetEngine {
    catalog: Arc<dyn MetadataCatalog>,
    executor: Arc<dyn SqlExecutor>,
    options: EngineOptions,
}

impl FacetEngine {
    pub fn new(catalog: Arc<dyn MetadataCatalog>, executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            catalog,
            executor,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Number of distinct groups, or `None` when the backend returned no
    /// result.
    pub async fn run_group_by_count<S: AsRef<str>>(
        &self,
        uid: &str,
        keys: &[S],
        params: GroupByCountParams,
    ) -> Result<Option<u64>> {
        let meta = self.catalog.require(uid)?;
        group_by::run_group_by_count(self.executor.as_ref(), &meta, keys, params).await
    }

    /// One representative row per distinct group, keyed by attribute name.
    pub async fn run_group_by<S: AsRef<str>>(
        &self,
        uid: &str,
        keys: &[S],
        params: GroupByParams,
    ) -> Result<Vec<RawRow>> {
        let meta = self.catalog.require(uid)?;
        group_by::run_group_by(self.executor.as_ref(), &meta, keys, params).await
    }

    /// Facet summaries for the filtered set. `config` lists facets
    /// explicitly; `None` derives them from the entity's attributes.
    pub async fn run_filters(
        &self,
        uid: &str,
        config: Option<&[FacetConfig]>,
        params: FilterParams,
    ) -> Result<Vec<FacetResult>> {
        let meta = self.catalog.require(uid)?;
        let configs = build_config(&meta, config, params.fields.as_deref());
        if configs.is_empty() {
            debug!(uid = %uid, "no facetable attributes");
            return Ok(Vec::new());
        }

        let batch = build_queries(&meta, &configs, params.filters, params.publication_state)?;
        let rows = execute_batch(self.executor.as_ref(), batch, &configs).await?;

        let max_values = params.max_values.unwrap_or(self.options.max_values);
        let results = normalize(&rows, &configs, max_values);
        info!(uid = %uid, total = rows.ranges.total, facets = results.len(), "facets computed");
        Ok(results)
    }
}
