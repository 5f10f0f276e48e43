pub mod analyze;
pub mod history;
pub mod stats;
