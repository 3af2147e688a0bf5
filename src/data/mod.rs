pub mod fetcher;
pub mod provider;
pub mod returns;

pub use fetcher::{DailyBar, PriceFetcher};
pub use provider::{DbReturnProvider, ReturnDataProvider};
