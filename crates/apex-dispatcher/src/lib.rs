//! JSON-RPC 2.0 over NDJSON framing: parses the wire protocol, tracks
//! in-flight requests, and routes to built-in method handlers behind the
//! hook pipeline.

pub mod dispatcher;
pub mod error;
pub mod framing;
pub mod methods;
pub mod registry;
pub mod sandbox;
pub mod wire;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::DispatcherError;
pub use framing::{FrameEvent, FrameReader, FramingConfig};
pub use registry::{RegistryEntry, RequestRegistry, RequestStatus};
pub use sandbox::{SimulatedSandbox, ToolOutcome, ToolSandbox};
pub use wire::{WireError, WireNotification, WireRequest, WireResponse};
