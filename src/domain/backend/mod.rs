//! Backend domain - Prediction payloads, connections and the connection pool

mod connection;
mod pool;
mod tensor;

pub use connection::{ConnectionManager, PredictionConnection};
pub use pool::{ConnectionPool, PoolConfig, PoolState, PooledConnection};
pub use tensor::{PredictRequest, PredictResponse, Tensor, TensorValues};

#[cfg(test)]
pub use connection::mock::MockBackend;
