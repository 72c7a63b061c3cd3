pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame;
pub mod loader;
pub mod model;
pub mod submitter;
pub mod subscription;
pub mod transport;

pub use config::ReliefConfig;
pub use engine::{Engine, Inbound, LinkStatus, ListTicket, ReliefState, ViewChange};
pub use error::{ApiError, ConfigError, ConnectionError, MalformedEventError, SubmitError};
pub use model::{DetailKind, DetailSnapshot};
