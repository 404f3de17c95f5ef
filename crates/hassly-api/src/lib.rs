// hassly-api: wire protocol and transport for the Home Assistant WebSocket API

pub mod auth;
pub mod error;
pub mod message;
pub mod transport;

pub use auth::{HubHello, authenticate};
pub use error::Error;
pub use message::{CommandFrame, HubEvent, InboundMessage, RemoteError, ResultMessage};
pub use transport::{TlsOptions, WsStream};

/// Re-exported so downstream crates name frames without a direct
/// tungstenite dependency.
pub use tokio_tungstenite::tungstenite::Message as WsMessage;
pub use tokio_tungstenite::tungstenite::protocol::CloseFrame;
pub use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
