//! Core types and traits for the LED (Loss Event Database) incident register.
//!
//! Wire names are camelCase fields and human-readable enum values (`"Pending Approval L1"`,
//! `"External Factors"`), the format of LED export documents.

mod dto;
mod entity;
mod error;
mod lifecycle;
mod traits;
mod validate;

pub use dto::*;
pub use entity::*;
pub use error::*;
pub use lifecycle::*;
pub use traits::*;
pub use validate::*;
