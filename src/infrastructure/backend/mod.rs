//! Prediction backend clients

mod http;

pub use http::{HttpConnectionManager, HttpPredictionConnection};
