//! HTTP route handlers

pub mod devices;
pub mod notifications;
pub mod readings;
