#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod aggregate;
pub mod baseline;
pub mod batch;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod rank;
pub mod standardize;
pub mod table;
pub mod types;
pub mod views;
pub mod vocabulary;
pub mod weighting;

#[path = "../ingest/mod.rs"]
pub mod ingest;

#[path = "../report/mod.rs"]
pub mod report;
