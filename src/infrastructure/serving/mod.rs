//! Request execution: dispatch under a circuit breaker, aggregation and the
//! deadline-bounded gateway

mod aggregator;
mod dispatcher;
mod gateway;

pub use aggregator::ResultAggregator;
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use gateway::{Gateway, GatewayConfig, GatewayError};
