//! Core data model: domain types, errors, addressing validation, dispatch

pub mod address;
pub mod dispatch;
pub mod error;
pub mod types;
