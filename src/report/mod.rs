pub mod aggregate;
pub mod config;
pub mod error;
pub mod fill;
pub mod grid;
pub mod io;
pub mod model;
pub mod rank;
pub mod resolve;
pub mod template;

pub use error::{Result, ReportError};
