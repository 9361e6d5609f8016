//! Bluetooth Module
//!
//! BLE communication with the sensor glove.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     GloveService                        │
//! │  (worker: commands in, events out, owns all BLE state)  │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │  Session   │  │ Protocol │
//! │           │  │            │  │          │
//! │ - BLE     │  │ - State    │  │ - UUIDs  │
//! │ discovery │  │   machine  │  │ - Payload│
//! │ - Dedupe  │  │ - Reads    │  │ - Command│
//! └───────────┘  └─────┬──────┘  └──────────┘
//!                      │
//!                      ▼
//!               ┌────────────┐
//!               │ Connection │
//!               │ (btleplug) │
//!               └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - UUIDs, sensor payload decoding, command strings
//! - [`scanner`] - BLE device discovery
//! - [`session`] - Connection state machine over the [`session::GattLink`] seam
//! - [`connection`] - btleplug implementation of the link
//! - [`service`] - Worker coordinating scan, capture, training and control

pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;
pub mod session;

pub use service::GloveService;
