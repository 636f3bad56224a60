//! Fleet console: dual-protocol data resolver and bulk operation engine over
//! the fleet management API.

pub mod auto_clear;
pub mod client;
pub mod config;
pub mod engine;
pub mod resolver;
pub mod session;
pub mod transport;

pub use auto_clear::AutoClearScheduler;
pub use client::{ApiClient, ClientHandle};
pub use config::{BulkConfig, ConfigError, ConsoleConfig, Credentials, ResolverConfig};
pub use engine::{BulkOperationEngine, EnginePhase, OperationHandler, RestOperation};
pub use resolver::{CollectionQuery, NormalizedList, ResolvedVia, Resolver, SessionContext};
pub use session::BulkSession;
pub use transport::{ApiRequest, ReqwestTransport, Transport, TransportError};
