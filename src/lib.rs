//! Booking availability & pricing engine for hourly and nightly stays.
//!
//! Properties own room categories; each room category carries a four-tier
//! rate table (4h, 6h, 12h, nightly) and the bookings made against it. The
//! [`Engine`](engine::Engine) answers availability checks and price previews
//! and runs the booking transaction, journaling every change.

pub mod classifier;
pub mod config;
pub mod engine;
pub mod journal;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod observability;
pub mod wal;

pub use config::EngineConfig;
pub use engine::{Engine, EngineError};
