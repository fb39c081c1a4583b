//! Snapmenu billing - payment reconciliation service for the Snapmenu platform
//!
//! This library provides the billing core of Snapmenu: checkout session
//! creation against the configured payment providers, webhook ingestion and
//! verification, and the reconciliation of provider events into the
//! subscription ledger and per-user entitlement state.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod geo;
pub mod handlers;
pub mod id;
pub mod models;
pub mod payments;
pub mod rate_limit;
