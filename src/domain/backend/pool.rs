//! Bounded connection pool with scoped acquisition
//!
//! A [`PooledConnection`] returns its connection to the pool when dropped, so
//! every exit path (success, error, timeout, cancellation, panic unwinding)
//! releases it.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::debug;

use super::{ConnectionManager, PredictRequest, PredictResponse, PredictionConnection};
use crate::domain::DomainError;

#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Maximum connections handed out at once
    pub max_size: usize,
    /// How long `acquire` waits for a free slot
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            acquire_timeout: Duration::from_millis(50),
        }
    }
}

/// Snapshot of pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub idle: usize,
    pub in_use: usize,
}

struct PoolShared {
    manager: Arc<dyn ConnectionManager>,
    idle: Mutex<Vec<Box<dyn PredictionConnection>>>,
    permits: Arc<Semaphore>,
    config: PoolConfig,
}

/// Pool of backend connections, safe for concurrent acquire/release
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish()
    }
}

impl ConnectionPool {
    pub fn new(manager: Arc<dyn ConnectionManager>, config: PoolConfig) -> Self {
        let size = config.max_size.max(1);

        Self {
            shared: Arc::new(PoolShared {
                manager,
                idle: Mutex::new(Vec::with_capacity(size)),
                permits: Arc::new(Semaphore::new(size)),
                config,
            }),
        }
    }

    /// Takes a connection, reusing an idle one or opening a new one
    pub async fn acquire(&self) -> Result<PooledConnection, DomainError> {
        let permit = timeout(
            self.shared.config.acquire_timeout,
            self.shared.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| DomainError::backend("Connection pool exhausted"))?
        .map_err(|_| DomainError::backend("Connection pool closed"))?;

        let idle = self.lock_idle().pop();

        let connection = match idle {
            Some(connection) => connection,
            None => {
                debug!("Opening new backend connection");
                self.shared.manager.connect().await?
            }
        };

        Ok(PooledConnection {
            connection: Some(connection),
            shared: self.shared.clone(),
            broken: false,
            _permit: permit,
        })
    }

    pub fn state(&self) -> PoolState {
        let max_size = self.shared.config.max_size.max(1);

        PoolState {
            idle: self.lock_idle().len(),
            in_use: max_size - self.shared.permits.available_permits(),
        }
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn PredictionConnection>>> {
        self.shared.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A connection on loan from the pool
pub struct PooledConnection {
    connection: Option<Box<dyn PredictionConnection>>,
    shared: Arc<PoolShared>,
    broken: bool,
    // Released after the connection is back in the idle list
    _permit: OwnedSemaphorePermit,
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("broken", &self.broken)
            .finish()
    }
}

impl PooledConnection {
    pub async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, DomainError> {
        match &self.connection {
            Some(connection) => connection.predict(request).await,
            None => Err(DomainError::internal("Connection already released")),
        }
    }

    /// Discards the connection instead of returning it to the pool
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        if self.broken {
            debug!("Discarding broken backend connection");
            return;
        }

        self.shared
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(connection);
    }
}
