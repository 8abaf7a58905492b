//! OSCQuery Server
//!
//! Serves a method tree as JSON over HTTP, accepts OSC over WebSocket and
//! UDP, pushes change notifications to WebSocket subscribers, and
//! advertises itself over mDNS as an `_oscjson._tcp` service.
//!
//! ```no_run
//! use oscquery_core::{Access, Argument, NodeOptions, OscValue, Range, SimpleType};
//! use oscquery_server::{OscQueryServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = OscQueryServer::start(ServerConfig::default()).await.unwrap();
//!
//!     server.add_method(
//!         "/foo",
//!         NodeOptions::new()
//!             .with_access(Access::ReadOnly)
//!             .with_arguments(vec![
//!                 Argument::new(SimpleType::Float).with_range(Range::bounds(0.0, 100.0)),
//!             ]),
//!     );
//!     server.set_value("/foo", 0, OscValue::Float(0.5)).unwrap();
//! }
//! ```

pub mod advertise;
pub mod config;
pub mod error;
pub mod http;
pub mod osc_udp;
pub mod server;
pub mod ws;

pub use advertise::sanitize_service_name;
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::OscQueryServer;
