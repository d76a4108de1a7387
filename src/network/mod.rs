//! Network Layer
//!
//! JSON-over-WebSocket transport for the engine's operations.
//! Nothing here decides game outcomes; every request goes through `engine/`.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{authenticate, validate_token, AuthConfig, AuthError, TokenClaims};
pub use protocol::{AuthResult, ClientMessage, ErrorInfo, ServerMessage};
pub use server::{ClientSession, Dispatcher, DuelServer, ServerConfig, ServerError};
