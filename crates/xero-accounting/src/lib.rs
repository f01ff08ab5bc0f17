//! Xero Accounting API client
//!
//! Typed models for the handful of Accounting API resources the demo uses
//! (contacts, accounts, branding themes, invoices, purchase orders, quotes
//! and attachments) and [`AccountingApi`], a tenant-scoped client built per
//! request from an access token.

pub mod client;
pub mod error;
pub mod models;

pub use client::AccountingApi;
pub use error::{Error, Result};
pub use models::*;
