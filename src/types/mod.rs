pub mod classification;
pub mod config;
pub mod photo;
pub mod report;
pub mod scoring;
