//! In-memory graph description consumed by [`crate::RuntimeGraph::init`].
//!
//! This is the already-parsed form of a model: operators with typed input
//! edges, output edges listing their consumers, parameters and weight blobs.
//! It can be built in code or round-tripped through JSON.
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::attribute::{Attribute, DataType};
use super::parameter::Parameter;

/// Input edge of an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperandDesc {
    /// Name of the operator producing this edge.
    pub producer: String,
    /// Declared shape, batch first.
    pub shape: Vec<i32>,
    /// Element type tag: 0 unknown, 1 float32.
    #[serde(default = "float32_code")]
    pub dtype: i32,
}

/// Output edge of an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDesc {
    pub shape: Vec<i32>,
    #[serde(default = "float32_code")]
    pub dtype: i32,
    /// Names of the operators consuming this edge.
    pub consumers: Vec<String>,
}

/// Raw weight blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDesc {
    #[serde(default = "float32_code")]
    pub dtype: i32,
    pub shape: Vec<i32>,
    /// Little-endian float32 payload.
    pub data: Vec<u8>,
}

impl AttributeDesc {
    pub fn from_f32(shape: Vec<i32>, values: &[f32]) -> Self {
        Self {
            dtype: DataType::Float32.code(),
            shape,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// Validate and convert into a runtime attribute.
    pub fn to_attribute(&self) -> Result<Attribute> {
        let dtype = DataType::from_code(self.dtype)?;
        Attribute::new(dtype, self.shape.clone(), self.data.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorDesc {
    /// Registry key, e.g. `nn.Conv2d`.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<OperandDesc>,
    #[serde(default)]
    pub outputs: Vec<OutputDesc>,
    #[serde(default)]
    pub params: BTreeMap<String, Parameter>,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttributeDesc>,
}

impl OperatorDesc {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn input(mut self, producer: impl Into<String>, shape: &[i32]) -> Self {
        self.inputs.push(OperandDesc {
            producer: producer.into(),
            shape: shape.to_vec(),
            dtype: float32_code(),
        });
        self
    }

    pub fn output(mut self, shape: &[i32], consumers: &[&str]) -> Self {
        self.outputs.push(OutputDesc {
            shape: shape.to_vec(),
            dtype: float32_code(),
            consumers: consumers.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: Parameter) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn attr(mut self, name: impl Into<String>, shape: &[i32], values: &[f32]) -> Self {
        self.attrs
            .insert(name.into(), AttributeDesc::from_f32(shape.to_vec(), values));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub operators: Vec<OperatorDesc>,
}

impl GraphDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: OperatorDesc) -> &mut Self {
        self.operators.push(op);
        self
    }

    pub fn with(mut self, op: OperatorDesc) -> Self {
        self.operators.push(op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse graph description")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read graph description {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("failed to load graph description {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json_string()?)
            .with_context(|| format!("failed to write graph description {}", path.display()))
    }
}

fn float32_code() -> i32 {
    DataType::Float32.code()
}
