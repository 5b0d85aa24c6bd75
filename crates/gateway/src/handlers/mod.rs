//! HTTP request handlers

pub mod health;
pub mod leases;
pub mod properties;
pub mod tenants;
pub mod units;
