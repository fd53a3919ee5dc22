pub mod assessor;
pub mod scoring;
pub mod sim;

pub use assessor::{AssessorHandle, MarketAssessor};
pub use scoring::score_factors;
pub use sim::SimulatedMarketFeed;
