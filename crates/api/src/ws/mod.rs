//! WebSocket collaboration: connection and room management, heartbeat, the
//! authenticated upgrade handler and the client message dispatcher.

pub mod dispatch;
mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::{heartbeat_tick, start_heartbeat};
pub use manager::WsManager;
