//! Remote data sources.
//!
//! Runners never talk to the network directly; they go through these
//! traits so tests can substitute canned pages and query results.

pub mod query;
pub mod web;

pub use query::{default_engine, QueryEngine, UnavailableEngine};
pub use web::{HtmlSource, HttpHtmlSource};
