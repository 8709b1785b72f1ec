//! # petreg core
//!
//! Core types, configuration, and the permission catalog for petreg.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Client and user identifier types
//! - The seeded permission codename catalog
//! - Secret wrappers that redact themselves in logs
//! - Credential input validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod secrets;
pub mod types;
pub mod validation;

pub use catalog::{Action, CatalogEntry, CategoryKind, Resource};
pub use config::{AuthConfig, Config, ConfigError, HashingConfig, SigningAlgorithm};
pub use secrets::PlainSecret;
pub use types::{ClientId, IdParseError, SortOrder, UserId};
pub use validation::{ValidationError, normalize_email, validate_password};
