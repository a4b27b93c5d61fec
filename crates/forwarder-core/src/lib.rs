//! # Forwarder Core
//!
//! Ingestion-and-delivery core of a serverless log-shipping connector.
//!
//! A single invocation receives a batch of cloud events (S3 notifications
//! delivered over SQS, Kinesis stream records, or replayed messages from a
//! previous failed invocation), classifies the trigger, resolves the routing
//! configuration for that source, transforms each raw event into a structured
//! document, and delivers documents to Elasticsearch with bulk batching,
//! idempotent document IDs, and failure replay.
//!
//! ## Architecture
//!
//! ```text
//!   Trigger batch
//!        │
//!        v
//!   ┌────────────┐     ┌─────────────┐
//!   │ Classifier │ ──> │  Resolver   │ (inline attribute or S3 config file)
//!   └────────────┘     └──────┬──────┘
//!                             │
//!                             v
//!   ┌──────────────────────────────────┐
//!   │        Composite Shipper         │ (one member per configured output)
//!   └──────┬───────────────────────────┘
//!          │ send / flush
//!          v
//!   ┌──────────────┐   partial failure   ┌────────────────┐
//!   │  ES Shipper  │ ──────────────────> │ Replay Handler │
//!   └──────────────┘                     └────────────────┘
//! ```
//!
//! Delivery is at-least-once: bulk operations use create semantics with
//! deterministic IDs, so a redelivered source event is rejected by the
//! backend instead of indexed twice.
//!
//! The invocation harness (function registration, timeouts, platform retry)
//! is owned by the host runtime and not part of this crate.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

/// Typed routing configuration parsed from YAML
pub mod config;

/// Object-key pattern rules mapping to (dataset, namespace) pairs
pub mod dataset;

/// Error taxonomy - fatal vs. suppressed outcomes
pub mod error;

/// Deterministic, collision-resistant document IDs
pub mod event_id;

/// Logging infrastructure and tracing setup
pub mod logger;

/// Per-invocation wiring of classifier, config, and shippers
pub mod pipeline;

/// Replay of unsendable documents over a dedicated retry queue
pub mod replay;

/// Config source resolution - inline attribute or external storage
pub mod resolver;

/// Composite and Elasticsearch shippers plus the bulk transport
pub mod shipper;

/// External object storage access
pub mod storage;

/// Trigger classification for incoming event batches
pub mod trigger;
