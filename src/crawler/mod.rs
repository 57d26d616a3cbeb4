//! Crawler module for depth-bounded traversal
//!
//! This module contains the core crawling logic, including:
//! - The fetch adapter contract and its HTTP implementation
//! - HTML title and link extraction
//! - The traversal engine and its worker pool
//! - The result consumer enforcing the run budgets
//! - The control loop and its external triggers

mod consumer;
mod control;
mod engine;
mod fetcher;
mod parser;
mod signals;

pub use consumer::{Consumer, ConsumerOutcome, ConsumerReport};
pub use control::{run, Controller, RunSummary, StopReason};
pub use engine::{CrawlResult, Engine, PoolConfig, ResultStream};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher, Resource};
pub use parser::{parse_html, ParsedPage};
pub use signals::{TriggerHandle, Triggers};
