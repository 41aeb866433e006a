pub mod address_parser;
pub mod columns;
pub mod config;
pub mod env_loader;
pub mod excel_writer;
pub mod geocoding;
pub mod models;
pub mod name_matching;
pub mod org_units;
pub mod output;
pub mod pipeline;
pub mod record_builder;
pub mod tabular;
