//! Filter facets: classification, query batch, execution and normalization.
//!
//! ```text
//! FacetConfig[] ──► build_queries ──► execute_batch ──► normalize ──► FacetResult[]
//!                   (one template,     (concurrent,       (drops useless
//!                    N statements)      fail-fast)         facets, full_set)
//! ```

mod batch;
mod config;
mod label;
mod normalize;
mod rows;

pub use batch::{build_batch, build_queries, execute_batch, BatchEntry, RANGES_KEY};
pub use config::{build_config, classify, classify_attribute, FacetConfig, FacetKind, RangeHints, ValueOption, ValuesConfig};
pub use label::title_label;
pub use normalize::{normalize, FacetData, FacetItem, FacetResult, RangeBound};
pub use rows::{FacetRows, ListAggregateRow, RangeAggregate, RangeAggregateRow};

/// Default cap on distinct values of a list facet.
pub const DEFAULT_MAX_VALUES: usize = 256;
