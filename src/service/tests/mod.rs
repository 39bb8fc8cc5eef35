//! Executor service test utilities and scenarios.

pub mod utils;


pub use builder::ExecutorServiceBuilder;
