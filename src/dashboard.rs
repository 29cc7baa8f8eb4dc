use crate::aggregate::aggregate;
use crate::cache::{ObservationCache, QueryKey};
use crate::error::DashboardError;
use crate::filtering::FilterCriteria;
use crate::normalize::normalize_documents;
use crate::normalize::table::ObservationTable;
use crate::source::DocumentSource;
use crate::types::date_bound::DateBound;
use crate::view::{DashboardView, DEFAULT_PREVIEW_LIMIT};
use bon::bon;
use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

/// The choices offered to the user, with their defaults.
///
/// Every station is selected and the full date range is used unless the user
/// narrows them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Controls {
    /// Sorted distinct location keys.
    pub stations: Vec<String>,
    /// Earliest observed date; `None` when no observation has a timestamp.
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
}

/// Fetches, normalizes, filters and aggregates observations from one source.
///
/// The normalized table is fetched once and kept in an [`ObservationCache`];
/// every [`Dashboard::render`] recomputes filtering and aggregation from it.
pub struct Dashboard {
    source: Box<dyn DocumentSource>,
    cache: Arc<ObservationCache>,
    key: QueryKey,
    preview_limit: usize,
}

#[bon]
impl Dashboard {
    /// Creates a dashboard over `source`.
    ///
    /// # Arguments
    ///
    /// * `.source(Box<dyn DocumentSource>)`: **Required.** Where the observations are read from.
    /// * `.cache(Arc<ObservationCache>)`: Optional. Share a cache between dashboards. Defaults to a new one.
    /// * `.preview_limit(usize)`: Optional. Default preview length. Defaults to 200 rows.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use weather_dashboard::{Dashboard, MemoryDocumentSource};
    /// let dashboard = Dashboard::builder()
    ///     .source(Box::new(MemoryDocumentSource::new("demo", Vec::new())))
    ///     .preview_limit(50)
    ///     .build();
    /// assert_eq!(dashboard.source_description(), "memory:demo");
    /// ```
    #[builder]
    pub fn new(
        source: Box<dyn DocumentSource>,
        cache: Option<Arc<ObservationCache>>,
        preview_limit: Option<usize>,
    ) -> Self {
        let key = source.query_key();
        Self {
            source,
            cache: cache.unwrap_or_default(),
            key,
            preview_limit: preview_limit.unwrap_or(DEFAULT_PREVIEW_LIMIT),
        }
    }

    /// Filters the cached observations and aggregates the result.
    ///
    /// # Arguments
    ///
    /// * `.stations(Vec<String>)`: Optional. Selected location keys. Defaults to all.
    /// * `.start(impl Into<DateBound>)`: Optional. Defaults to the earliest observation.
    /// * `.end(impl Into<DateBound>)`: Optional. Inclusive. Defaults to the latest observation.
    /// * `.preview_limit(usize)`: Optional. Overrides the dashboard's preview length.
    ///
    /// # Errors
    ///
    /// Everything [`Dashboard::load`] returns, plus
    /// [`DashboardError::EmptyFilterResult`] when no row passes the filter.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use weather_dashboard::{Dashboard, DashboardError, MemoryDocumentSource, RawDocument};
    /// # use chrono::NaiveDate;
    /// # use serde_json::json;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), DashboardError> {
    /// let doc = RawDocument::try_from(json!({
    ///     "ts": "2023-10-26T14:00:00Z",
    ///     "position": {"coordinates": [5.18, 52.1]},
    ///     "airTemperature": {"value": 11.5}
    /// })).unwrap();
    /// let dashboard = Dashboard::builder()
    ///     .source(Box::new(MemoryDocumentSource::new("demo", vec![doc])))
    ///     .build();
    ///
    /// let view = dashboard
    ///     .render()
    ///     .stations(vec!["52.1,5.18".to_string()])
    ///     .start(NaiveDate::from_ymd_opt(2023, 10, 26).unwrap())
    ///     .call()
    ///     .await?;
    /// assert_eq!(view.kpis[0].display, "11.50");
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn render(
        &self,
        stations: Option<Vec<String>>,
        #[builder(into)] start: Option<DateBound>,
        #[builder(into)] end: Option<DateBound>,
        preview_limit: Option<usize>,
    ) -> Result<DashboardView, DashboardError> {
        let table = self.load().await?;
        let criteria = FilterCriteria::for_table(&table)
            .maybe_locations(stations)
            .maybe_start(start)
            .maybe_end(end)
            .build()?;
        let filtered = criteria.apply(&table)?;
        if filtered.is_empty() {
            warn!(
                "No rows left after filtering {} rows from {}",
                table.height(),
                self.key
            );
            return Err(DashboardError::EmptyFilterResult);
        }

        let result = aggregate(&filtered)?;
        Ok(DashboardView::new(
            &self.source.describe(),
            &filtered,
            &result,
            preview_limit.unwrap_or(self.preview_limit),
        )?)
    }
}

impl Dashboard {
    /// Shorthand for a dashboard with its own cache and default settings.
    pub fn with_source(source: impl DocumentSource + 'static) -> Self {
        Self::builder().source(Box::new(source)).build()
    }

    /// Returns the normalized table, fetching it on first use.
    ///
    /// # Errors
    ///
    /// * [`DashboardError::SourceUnavailable`] if the store cannot be reached in time.
    /// * [`DashboardError::Source`] for other fetch failures.
    /// * [`DashboardError::EmptyDataset`] if the collection has no documents.
    pub async fn load(&self) -> Result<ObservationTable, DashboardError> {
        self.cache
            .get_or_load(&self.key, || async {
                let documents = self.source.fetch_all().await?;
                if documents.is_empty() {
                    warn!("No documents returned by {}", self.source.describe());
                    return Err(DashboardError::EmptyDataset {
                        origin: self.source.describe(),
                    });
                }
                let rows = normalize_documents(&documents);
                let table = ObservationTable::from_rows(&rows)?;
                info!(
                    "Loaded {} observations at {} locations from {}",
                    table.height(),
                    table.locations()?.len(),
                    self.source.describe()
                );
                Ok(table)
            })
            .await
    }

    /// Drops the cached table and fetches it again.
    pub async fn reload(&self) -> Result<ObservationTable, DashboardError> {
        self.cache.invalidate(&self.key).await;
        self.load().await
    }

    /// The selectable stations and date bounds.
    pub async fn controls(&self) -> Result<Controls, DashboardError> {
        let table = self.load().await?;
        let (date_min, date_max) = table.date_span()?.unzip();
        Ok(Controls {
            stations: table.locations()?,
            date_min,
            date_max,
        })
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    pub fn query_key(&self) -> &QueryKey {
        &self.key
    }

    pub fn cache(&self) -> &Arc<ObservationCache> {
        &self.cache
    }
}
