//! Real-time collaborative pixel canvas gateway.
//!
//! Hosts the WebSocket fan-out for pixel changes, the PNG snapshot and
//! stats endpoints, and the selections CRUD resource. All canvas and slot
//! pool mutation is serialized through the broadcast hub task.

pub mod connection;
pub mod hub;
pub mod selections;
pub mod server;
pub mod state;

pub use server::start_gateway;
pub use state::GatewayState;
