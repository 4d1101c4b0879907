pub mod context;
pub mod error;
pub mod service;

pub use context::AppContext;
pub use error::{Result, SeedwatchError};
pub use service::QueryService;
