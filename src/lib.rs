pub mod charset;
pub mod config;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod upstream;
pub mod val_curs;

pub use error::FeedError;
pub use val_curs::{FeedKind, RateDocument, RateEntry};
