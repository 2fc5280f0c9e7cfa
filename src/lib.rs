pub mod ad_rows;
pub mod apis;
pub mod config;
pub mod job;
pub mod notify;
pub mod tools;
pub mod utils;
pub mod week;
