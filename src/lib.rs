//! Persistent client for SNoti-style push-notification services.
//!
//! The service speaks newline-delimited JSON over TLS-on-TCP. A client
//! authenticates once per connection, then concurrently keeps the session
//! alive, delivers outbound frames, consumes and acknowledges pushed
//! events, and optionally produces remote-control requests, retrying a
//! bounded number of times when the connection is lost.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use snoti_client::{AuthCredential, Config, SnotiClient};
//!
//! # async fn example() {
//! let credential = AuthCredential {
//!     product_key: "your-product-key".into(),
//!     auth_id: "your-auth-id".into(),
//!     auth_secret: "your-auth-secret".into(),
//!     subkey: "your-subkey".into(),
//!     events: vec!["device.online".into()],
//! };
//!
//! let config = Config::new(
//!     "snoti.example.com:2017",
//!     vec![credential],
//!     Arc::new(|frame| println!("inbound: {frame}")),
//! )
//! .with_prefetch_count(50);
//!
//! let mut client = SnotiClient::new(config);
//! client.run().await;
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod protocol;

mod session;
mod shutdown;
mod transport;

pub use client::{ShutdownHandle, SnotiClient};
pub use config::{Config, ControlProducer, FrameHandler, Timeouts};
pub use error::{Error, Result};
pub use logging::LogSink;
pub use protocol::{
    AttributeControl, AttributeControlItem, AttributeTarget, AuthCredential, ControlRequest,
    InboundEvent, RawControl, RawControlItem, RawTarget,
};
