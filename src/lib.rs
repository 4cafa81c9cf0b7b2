//! Telemetry ingestion pipeline: a webhook receiver that buffers scanner
//! events in a staging store, periodically bulk-applies them to MySQL, and
//! runs the leader-only partition/refresher maintenance loops.

pub mod buffers;
pub mod bulk;
pub mod config;
pub mod event_parser;
pub mod flushers;
pub mod instance_lock;
pub mod iv_bucket;
pub mod leader_election;
pub mod log_format;
pub mod metrics;
pub mod models;
pub mod partitions;
pub mod reconcile;
pub mod refreshers;
pub mod relational_store;
pub mod schema;
pub mod shared_state;
pub mod staging_store;
pub mod supervisor;
pub mod webhook;
