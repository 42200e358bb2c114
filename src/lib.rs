pub mod error;
pub mod config;
pub mod models;
pub mod identity;
pub mod sync;
pub mod client;
pub mod dashboard;
pub mod cli;

pub use dashboard::{Dashboard, HttpDashboard};
pub use error::{AppError, AppResult};

// Test-only printing helper: expands to eprintln! in test and debug builds and is a no-op otherwise.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
