mod aggregate;
mod cache;
mod config;
mod dashboard;
mod error;
mod filtering;
mod normalize;
mod source;
mod types;
mod view;

pub use error::{DashboardError, Severity};
pub use source::error::SourceError;

pub use dashboard::{Controls, Dashboard};
pub use cache::{ObservationCache, QueryKey};

pub use source::document::RawDocument;
pub use source::file::FileDocumentSource;
pub use source::http::{HttpDocumentSource, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT};
pub use source::memory::MemoryDocumentSource;
pub use source::mongo::MongoDocumentSource;
pub use source::DocumentSource;

pub use normalize::row::*;
pub use normalize::strategies::{coerce_f64, parse_datetime_str};
pub use normalize::table::{collect_rows, ObservationTable};
pub use normalize::{normalize_document, normalize_documents};

pub use filtering::{FilterCriteria, ObservationFrameFilterExt, TimeInterval};
pub use types::date_bound::DateBound;

pub use aggregate::{aggregate, AggregateResult, MeasurementMeans};
pub use view::{Chart, ChartPoint, ChartSeries, ChartX, DashboardView, Kpi, DEFAULT_PREVIEW_LIMIT};

pub use config::{
    find_config_file, load_config, ConfigError, ConfigSource, APP_NAME, CONFIG_ENV_VAR,
    CONFIG_FILE_NAME, DEFAULT_COLLECTION, DEFAULT_DATABASE,
};
