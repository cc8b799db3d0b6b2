//! TF-Serving REST prediction client
//!
//! Sends the columnar `inputs` form of the `:predict` API. Binary string
//! tensors travel as `{"b64": ...}` objects.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::{json, Map, Value};

use crate::domain::backend::{
    ConnectionManager, PredictRequest, PredictResponse, PredictionConnection, Tensor, TensorValues,
};
use crate::domain::DomainError;

/// Hands out connections sharing one `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpConnectionManager {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpConnectionManager {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ConnectionManager for HttpConnectionManager {
    async fn connect(&self) -> Result<Box<dyn PredictionConnection>, DomainError> {
        Ok(Box::new(HttpPredictionConnection {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct HttpPredictionConnection {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPredictionConnection {
    fn predict_url(&self, request: &PredictRequest) -> String {
        match request.model_version {
            Some(version) => format!(
                "{}/v1/models/{}/versions/{}:predict",
                self.endpoint, request.model_name, version
            ),
            None => format!("{}/v1/models/{}:predict", self.endpoint, request.model_name),
        }
    }
}

#[async_trait]
impl PredictionConnection for HttpPredictionConnection {
    async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, DomainError> {
        let response = self
            .client
            .post(self.predict_url(request))
            .json(&encode_request(request))
            .send()
            .await
            .map_err(|e| DomainError::backend(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::backend(format!("HTTP {}: {}", status, error_body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DomainError::backend(format!("Failed to parse response: {}", e)))?;

        decode_response(body, &request.output_filter)
    }
}

fn encode_tensor(tensor: &Tensor) -> Value {
    match tensor.values() {
        TensorValues::Strings(values) => Value::Array(
            values
                .iter()
                .map(|value| json!({ "b64": STANDARD.encode(value) }))
                .collect(),
        ),
        TensorValues::Floats(values) => json!(values),
    }
}

fn encode_request(request: &PredictRequest) -> Value {
    let inputs: Map<String, Value> = request
        .inputs
        .iter()
        .map(|(name, tensor)| (name.clone(), encode_tensor(tensor)))
        .collect();

    json!({ "inputs": inputs })
}

fn decode_tensor(name: &str, value: Value) -> Result<Tensor, DomainError> {
    let Value::Array(values) = value else {
        return Err(DomainError::backend(format!("Output '{}' is not a list", name)));
    };

    if values.iter().all(Value::is_number) {
        let floats = values
            .iter()
            .filter_map(Value::as_f64)
            .map(|v| v as f32)
            .collect();
        return Ok(Tensor::floats(floats));
    }

    let strings = values
        .into_iter()
        .map(|value| match value {
            Value::String(s) => Ok(Bytes::from(s)),
            Value::Object(mut obj) => match obj.remove("b64") {
                Some(Value::String(encoded)) => STANDARD
                    .decode(encoded)
                    .map(Bytes::from)
                    .map_err(|e| DomainError::backend(format!("Invalid base64 in '{}': {}", name, e))),
                _ => Err(DomainError::backend(format!("Unsupported value in '{}'", name))),
            },
            _ => Err(DomainError::backend(format!("Unsupported value in '{}'", name))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Tensor::strings(strings))
}

/// Accepts both the named-map and the single-output list forms of `outputs`
fn decode_response(body: Value, output_filter: &[String]) -> Result<PredictResponse, DomainError> {
    let outputs = match body {
        Value::Object(mut obj) => obj
            .remove("outputs")
            .ok_or_else(|| DomainError::backend("Response has no 'outputs'"))?,
        _ => return Err(DomainError::backend("Response is not a JSON object")),
    };

    let mut response = PredictResponse::default();

    match outputs {
        Value::Object(named) => {
            for (name, value) in named {
                if output_filter.is_empty() || output_filter.contains(&name) {
                    let tensor = decode_tensor(&name, value)?;
                    response = response.with_output(name, tensor);
                }
            }
        }
        single => {
            let name = output_filter.first().ok_or_else(|| {
                DomainError::backend("Unnamed output returned without an output filter")
            })?;
            response = response.with_output(name.clone(), decode_tensor(name, single)?);
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{INPUT_ITEMS, INPUT_USER, OUTPUT_ITEM_IDS, OUTPUT_SCORES};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn connection(server: &MockServer) -> Box<dyn PredictionConnection> {
        HttpConnectionManager::new(server.uri(), Duration::from_secs(1))
            .unwrap()
            .connect()
            .await
            .unwrap()
    }

    fn request() -> PredictRequest {
        PredictRequest::new("rank")
            .with_version(Some(3))
            .with_input(INPUT_USER, Tensor::strings(vec![Bytes::from_static(b"\x01\x02")]))
            .with_input(INPUT_ITEMS, Tensor::strings(vec![Bytes::new(), Bytes::new()]))
            .with_output(OUTPUT_SCORES)
    }

    #[tokio::test]
    async fn test_predict_named_outputs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/rank/versions/3:predict"))
            .and(body_partial_json(json!({
                "inputs": { "userExamples": [{ "b64": "AQI=" }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "outputs": { "scores": [0.25, 0.75], "debug": [1.0] }
            })))
            .mount(&server)
            .await;

        let response = connection(&server).await.predict(&request()).await.unwrap();

        assert_eq!(response.output(OUTPUT_SCORES).unwrap().as_floats().unwrap(), &[0.25, 0.75]);
        assert!(response.output("debug").is_err());
    }

    #[tokio::test]
    async fn test_predict_single_unnamed_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/rank/versions/3:predict"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "outputs": [0.5, 0.1] })),
            )
            .mount(&server)
            .await;

        let response = connection(&server).await.predict(&request()).await.unwrap();

        assert_eq!(response.output(OUTPUT_SCORES).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_string_outputs_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/recall:predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "outputs": { "item_ids": ["a", { "b64": "Yg==" }], "scores": [0.9, 0.8] }
            })))
            .mount(&server)
            .await;

        let request = PredictRequest::new("recall")
            .with_output(OUTPUT_ITEM_IDS)
            .with_output(OUTPUT_SCORES);
        let response = connection(&server).await.predict(&request).await.unwrap();

        let ids = response.output(OUTPUT_ITEM_IDS).unwrap().as_strings().unwrap();
        assert_eq!(ids, &[Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }

    #[tokio::test]
    async fn test_http_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = connection(&server).await.predict(&request()).await.unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let manager = HttpConnectionManager::new("http://tf:8501/", Duration::from_secs(1)).unwrap();
        assert_eq!(manager.endpoint(), "http://tf:8501");
    }
}
