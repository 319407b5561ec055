#![forbid(unsafe_code)]

pub mod config;
pub mod dates;
pub mod dispatcher;
pub mod errors;
pub mod flavor;
pub mod intent;
pub mod lunch;
pub mod models;
pub mod oncall;
pub mod scheduler;
pub mod slack;
pub mod transport;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
