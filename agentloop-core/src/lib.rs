pub mod application;
pub mod config;
pub mod constants;
pub mod infrastructure;

pub use application::{agent, stdio, tooling};
pub use config::AppConfig;
pub use infrastructure::model;
