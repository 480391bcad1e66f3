pub mod aggregate;
pub mod baseline;
pub mod classify;
pub mod orchestrator;
pub mod pipeline;
pub mod render;
pub mod rules;
pub mod trend;
