//! Backend connection contracts

use std::fmt::Debug;

use async_trait::async_trait;

use super::{PredictRequest, PredictResponse};
use crate::domain::DomainError;

/// A live connection to the prediction backend
#[async_trait]
pub trait PredictionConnection: Send + Sync + Debug {
    async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, DomainError>;
}

/// Opens new backend connections for the pool
#[async_trait]
pub trait ConnectionManager: Send + Sync + Debug {
    async fn connect(&self) -> Result<Box<dyn PredictionConnection>, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    type Responder = dyn Fn(&PredictRequest) -> Result<PredictResponse, DomainError> + Send + Sync;
    type Delay = dyn Fn(&PredictRequest) -> Duration + Send + Sync;

    struct BackendState {
        responder: Mutex<Arc<Responder>>,
        delay: Mutex<Arc<Delay>>,
        connects: AtomicUsize,
        calls: AtomicUsize,
        requests: Mutex<Vec<PredictRequest>>,
    }

    /// Scripted backend: hands out connections that answer with `responder`
    #[derive(Clone)]
    pub struct MockBackend {
        state: Arc<BackendState>,
    }

    impl fmt::Debug for MockBackend {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("MockBackend")
                .field("calls", &self.call_count())
                .finish()
        }
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self {
                state: Arc::new(BackendState {
                    responder: Mutex::new(Arc::new(|_| Ok(PredictResponse::default()))),
                    delay: Mutex::new(Arc::new(|_| Duration::ZERO)),
                    connects: AtomicUsize::new(0),
                    calls: AtomicUsize::new(0),
                    requests: Mutex::new(Vec::new()),
                }),
            }
        }

        pub fn respond_with<F>(&self, responder: F)
        where
            F: Fn(&PredictRequest) -> Result<PredictResponse, DomainError> + Send + Sync + 'static,
        {
            *self.state.responder.lock().unwrap() = Arc::new(responder);
        }

        pub fn set_delay(&self, delay: Duration) {
            self.delay_with(move |_| delay);
        }

        /// Per-request latency, e.g. slow only for large item lists
        pub fn delay_with<F>(&self, delay: F)
        where
            F: Fn(&PredictRequest) -> Duration + Send + Sync + 'static,
        {
            *self.state.delay.lock().unwrap() = Arc::new(delay);
        }

        pub fn call_count(&self) -> usize {
            self.state.calls.load(Ordering::SeqCst)
        }

        pub fn connect_count(&self) -> usize {
            self.state.connects.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<PredictRequest> {
            self.state.requests.lock().unwrap().clone()
        }
    }

    #[derive(Debug)]
    struct MockConnection {
        backend: MockBackend,
    }

    #[async_trait]
    impl PredictionConnection for MockConnection {
        async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, DomainError> {
            let state = &self.backend.state;
            state.calls.fetch_add(1, Ordering::SeqCst);
            state.requests.lock().unwrap().push(request.clone());

            let delay = {
                let delay = state.delay.lock().unwrap().clone();
                delay(request)
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let responder = state.responder.lock().unwrap().clone();
            responder(request)
        }
    }

    #[async_trait]
    impl ConnectionManager for MockBackend {
        async fn connect(&self) -> Result<Box<dyn PredictionConnection>, DomainError> {
            self.state.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockConnection {
                backend: self.clone(),
            }))
        }
    }
}
