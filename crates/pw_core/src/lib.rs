pub mod config;
pub mod error;
pub mod ident;
pub mod transport;
pub mod types;

pub use config::WatchConfig;
pub use error::Error;
pub use transport::{MarkupMode, Transport};
pub use types::{
    AggregationRequest, AggregationResult, DateRange, Paper, TopicFailure, TopicQuery,
};

pub type Result<T> = std::result::Result<T, Error>;
