// Library exports for the transit server selector

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod telemetry;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use services::selector::{
    ChoiceOutcome, CustomUrlOutcome, SelectedServer, SelectionRequest, SelectionSession,
    ServerSelector,
};
