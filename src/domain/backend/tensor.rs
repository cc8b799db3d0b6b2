//! Tensor-style prediction payloads

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;

use crate::domain::DomainError;

#[derive(Debug, Clone, PartialEq)]
pub enum TensorValues {
    Strings(Vec<Bytes>),
    Floats(Vec<f32>),
}

/// A named input or output of a prediction call
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<i64>,
    values: TensorValues,
}

impl Tensor {
    /// 1-D string tensor; the shape is the number of entries
    pub fn strings(values: Vec<Bytes>) -> Self {
        Self {
            shape: vec![values.len() as i64],
            values: TensorValues::Strings(values),
        }
    }

    /// 1-D float tensor
    pub fn floats(values: Vec<f32>) -> Self {
        Self {
            shape: vec![values.len() as i64],
            values: TensorValues::Floats(values),
        }
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    pub fn values(&self) -> &TensorValues {
        &self.values
    }

    pub fn dtype(&self) -> &'static str {
        match self.values {
            TensorValues::Strings(_) => "DT_STRING",
            TensorValues::Floats(_) => "DT_FLOAT",
        }
    }

    pub fn len(&self) -> usize {
        match &self.values {
            TensorValues::Strings(v) => v.len(),
            TensorValues::Floats(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match &self.values {
            TensorValues::Floats(v) => Some(v),
            TensorValues::Strings(_) => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[Bytes]> {
        match &self.values {
            TensorValues::Strings(v) => Some(v),
            TensorValues::Floats(_) => None,
        }
    }
}

/// One call to the prediction backend
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub model_name: String,
    pub model_version: Option<i64>,
    pub inputs: BTreeMap<String, Tensor>,
    pub output_filter: Vec<String>,
}

impl PredictRequest {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            model_version: None,
            inputs: BTreeMap::new(),
            output_filter: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: Option<i64>) -> Self {
        self.model_version = version;
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.inputs.insert(name.into(), tensor);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.output_filter.push(name.into());
        self
    }

    pub fn input(&self, name: &str) -> Option<&Tensor> {
        self.inputs.get(name)
    }
}

/// Backend outputs keyed by tensor name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictResponse {
    pub outputs: HashMap<String, Tensor>,
}

impl PredictResponse {
    pub fn with_output(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.outputs.insert(name.into(), tensor);
        self
    }

    /// Output tensor by name; a missing output is a backend contract violation
    pub fn output(&self, name: &str) -> Result<&Tensor, DomainError> {
        self.outputs
            .get(name)
            .ok_or_else(|| DomainError::backend(format!("Missing output tensor '{}'", name)))
    }

    /// Drops every output not named in `filter` (no-op for an empty filter)
    pub fn retain_outputs(&mut self, filter: &[String]) {
        if !filter.is_empty() {
            self.outputs.retain(|name, _| filter.contains(name));
        }
    }
}
