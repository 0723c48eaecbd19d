//! Data layer: providers, local cache, resampling and ticker lookup.

pub mod cache;
pub mod circuit_breaker;
pub mod csv_provider;
pub mod dates;
pub mod directory;
pub mod download;
pub mod http;
pub mod krx;
pub mod naver;
pub mod provider;
pub mod resample;

pub use cache::{CacheMeta, CacheStatus, CoverageResult, DateSpan, ParquetCache};
pub use circuit_breaker::CircuitBreaker;
pub use csv_provider::CsvProvider;
pub use dates::{parse_date, resolve_range};
pub use directory::{Listing, TickerDirectory};
pub use download::{download_codes, DownloadRequest, DownloadSummary};
pub use krx::KrxProvider;
pub use naver::NaverProvider;
pub use provider::{clean_bars, DataError, DataProvider, DataSource, FetchResult};
pub use resample::{filter_period, resample, resample_monthly, resample_weekly};
