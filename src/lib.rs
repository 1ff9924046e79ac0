//! # verbena-backend
//!
//! Booking backend for a party and event rental business. Customers put
//! catalog items (services, bundles, promotions) in a cart, convert the
//! cart into a slot-bound reservation, and pick a payment method; admins
//! approve or void reservations. Email notifications fire after every
//! lifecycle transition.
//!
//! Storage is PostgreSQL behind a primary/mirror failover layer: a
//! circuit-breaker router picks the replica per operation, and a
//! reconciliation job copies mirror-only rows back to the primary after
//! an outage window.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)                       Operator (CLI)
//!     │                                    │
//!     ├── REST Handlers (api/)             └── sync subcommand
//!     │
//!     ├── CartService / BookingService (service/)
//!     ├── EventBus ──► NotificationWorker ──► mail API
//!     │
//!     ├── BookingRepo (persistence/)
//!     │
//!     ├── RoutedPools ◄── FailoverRouter ◄── probe / circuit flags
//!     │                        │
//!     │                        └── recovery edge ──► Reconciler
//!     │
//!     └── PostgreSQL (primary + mirror)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
