pub mod cancel;
pub mod contact_extractor;
pub mod contact_fetcher;
pub mod context;
pub mod droid;
pub mod export;
pub mod maps_scraper;
pub mod page;
pub mod pipeline;
pub mod record_extractor;

pub use cancel::Cancelled;
pub use contact_fetcher::*;
pub use context::*;
pub use droid::*;
pub use maps_scraper::*;
pub use page::*;
pub use pipeline::*;
pub use record_extractor::*;
