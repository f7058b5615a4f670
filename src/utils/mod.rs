pub mod errors;
pub mod logging;

// Re-export commonly used utility functions at the module level
pub use logging::init_logger;
