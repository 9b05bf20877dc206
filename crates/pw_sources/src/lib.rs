pub mod aggregator;
pub mod sources;

pub use aggregator::Aggregator;
pub use sources::{ArxivSource, MedrxivSource, PaperSource, SourcePage};

pub mod prelude {
    pub use super::sources::PaperSource;
    pub use pw_core::{Error, Paper, Result};
}
