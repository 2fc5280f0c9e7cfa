pub mod analytics;
pub mod slack;
