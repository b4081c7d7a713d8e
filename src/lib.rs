//! Bookperks - VIP code redemption and pre-order bonus service for the book launch site
//!
//! This library provides the backend for the launch site's bonus subsystem:
//! code generation and redemption, entitlement resolution, signed download
//! links, and the manual bonus-claim review workflow.

pub mod assets;
pub mod claims;
pub mod config;
pub mod crypto;
pub mod db;
pub mod entitlements;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod rate_limit;
pub mod redemption;
pub mod token;
pub mod util;
