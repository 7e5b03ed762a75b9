//! Per-invocation proxying: argument translation and the downstream call.

pub mod executor;
pub mod translator;

pub use executor::{DownstreamResponse, ProxyExecutor};
pub use translator::{translate, DownstreamRequest, RequestBody, TransportContext};
