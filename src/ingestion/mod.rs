//! Ingestion module for the downstream interface description.
//!
//! This module fetches a service's OpenAPI document and parses it into an
//! ordered set of operations the catalog builder turns into tools.

pub mod fetcher;
pub mod openapi;
pub mod types;

pub use fetcher::SchemaFetcher;
pub use openapi::parse_openapi;
pub use types::{
    BodyEncoding, InterfaceDescription, OperationSpec, ParamLocation, ParameterSpec,
    RAW_BODY_PARAM,
};
