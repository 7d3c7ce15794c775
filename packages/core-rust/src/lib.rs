//! Switchyard Core: error taxonomy, commands, parameter schemas, connection
//! parameters, discovery and the reference locator.

pub mod commands;
pub mod connect;
pub mod context;
pub mod count;
pub mod errors;
pub mod refer;
pub mod schema;
pub mod trace;
pub mod traits;
pub mod types;

pub use commands::{Command, CommandSet, Commandable, Parameters};
pub use connect::{ConnectionParams, ConnectionResolver, Discovery, MemoryDiscovery};
pub use context::ContextInfo;
pub use count::{CounterTiming, Counters, MemoryCounters, MetricsCounters, NullCounters};
pub use errors::{ApplicationError, ErrorCategory, ErrorDescription};
pub use refer::References;
pub use schema::{ObjectSchema, PropertySchema, TypeCode, ValidationResult};
pub use trace::{LogTracer, NullTracer, TraceTiming, Tracer};
pub use traits::Openable;
pub use types::{DataPage, FilterParams, PagingParams};
