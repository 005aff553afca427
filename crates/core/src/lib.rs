//! usb-rgb-core: USB device discovery, color packet framing, and delivery.
//!
//! This crate provides the core logic for setting a static color on
//! USB-attached RGB lighting controllers that accept a fixed-format frame
//! written to an OUT endpoint.

pub mod comm;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod ident;
#[cfg(test)]
mod integration_tests;
pub mod payload;
pub mod transport;
pub mod usb;
