pub mod capture;
pub mod connection;
pub mod registry;
pub mod ws_server;

pub use capture::{CaptureBroker, CaptureOutcome};
pub use connection::ConnectionRegistry;
pub use registry::{ConnectionId, EndedSession, SessionId, SessionRegistry, SessionSnapshot};
pub use ws_server::{router, spawn_sweeper, BrokerState};
