pub mod gateway;
pub mod paper;

pub use gateway::ExecutionGateway;
pub use paper::PaperExecutionService;
