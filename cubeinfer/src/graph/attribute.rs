use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Element type tag carried by operands and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Unknown,
    Float32,
}

impl DataType {
    /// Decode the numeric tag of a graph description: 0 unknown, 1 float32.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(DataType::Unknown),
            1 => Ok(DataType::Float32),
            other => Err(anyhow!("unsupported data type tag {}", other)),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            DataType::Unknown => 0,
            DataType::Float32 => 1,
        }
    }
}

/// Weight blob attached to an operator: shape plus little-endian f32 bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    dtype: DataType,
    shape: Vec<i32>,
    data: Vec<u8>,
}

impl Attribute {
    /// Validate a raw attribute. Only float32 blobs whose byte length matches
    /// the shape are accepted.
    pub fn new(dtype: DataType, shape: Vec<i32>, data: Vec<u8>) -> Result<Self> {
        if dtype != DataType::Float32 {
            return Err(anyhow!("attribute type {:?} is not supported", dtype));
        }
        if data.len() % 4 != 0 {
            return Err(anyhow!(
                "attribute byte length {} is not a multiple of 4",
                data.len()
            ));
        }
        if shape.iter().any(|dim| *dim < 0) {
            return Err(anyhow!("attribute shape {:?} has negative dims", shape));
        }
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(*dim as usize))
            .ok_or_else(|| anyhow!("attribute shape {:?} overflows the element count", shape))?;
        if !shape.is_empty() && expected != data.len() / 4 {
            return Err(anyhow!(
                "attribute shape {:?} expects {} values, got {}",
                shape,
                expected,
                data.len() / 4
            ));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Encode `values` as a float32 attribute.
    pub fn from_f32(shape: Vec<i32>, values: &[f32]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DataType::Float32, shape, data)
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn shape(&self) -> &[i32] {
        &self.shape
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the payload.
    pub fn get_f32(&self) -> Vec<f32> {
        self.data
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }
}
