pub mod error;
pub mod logger;
pub mod monitor;
pub mod platform;
pub mod run;
pub mod validation;
