//! Connection management: parameters, transport, the send/receive
//! dispatcher, and the public [`Session`] handle.

pub mod dispatch;
pub mod params;
pub mod session;
pub mod transport;

pub use params::{ConnectParams, ConnectParamsBuilder, IntoConnectParams, ServerAddr};
pub use session::Session;
