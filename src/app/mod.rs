//! Application layer: hexagonal core plus its port boundary.

pub mod events;
pub mod ports;
pub mod service;

pub use events::{AppEvent, FixSummary};
pub use ports::{EventSink, GattError, GattPort, PublishError, PublishPort, SubscribeRequest};
pub use service::AppService;
