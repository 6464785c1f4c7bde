//! Client-side screening dashboard core: typed API contract, fetch client,
//! deviation ranking, chart-series preparation and request-scoped state.

pub mod error;
pub mod model;
pub mod normalize;
pub mod series;
pub mod sources;
pub mod state;

pub use error::FetchError;
pub use normalize::{DerivedScreeningRecord, normalize};
pub use series::{ChartDomain, PreparedSeries, convert_amount, prepare_series};
