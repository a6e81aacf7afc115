//! LED service: sessions, incident lifecycle, access policy, remediation tracking,
//! user administration and bulk data transfer over a [`led_store::RecordStore`].

mod business_unit;
mod config;
pub mod fixtures;
mod iam;
mod incident;
pub mod policy;
mod service;
mod session;
mod stats;
mod transfer;
mod users;

pub use config::LedConfig;
pub use incident::IncidentView;
pub use led_types::{LedError, LedResult};
pub use policy::{Action, Capabilities, Relationship};
pub use service::{LedService, SharedStore};
pub use session::Session;
pub use stats::summarize;
pub use transfer::export_file_name;
