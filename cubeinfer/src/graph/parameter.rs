use serde::{Deserialize, Serialize};

/// Operator parameter value, stored by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Parameter {
    Null,
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    StrArray(Vec<String>),
}

impl Parameter {
    /// Numeric tag used by serialized graph descriptions.
    pub fn type_code(&self) -> i32 {
        match self {
            Parameter::Null => 0,
            Parameter::Bool(_) => 1,
            Parameter::Int(_) => 2,
            Parameter::Float(_) => 3,
            Parameter::Str(_) => 4,
            Parameter::IntArray(_) => 5,
            Parameter::FloatArray(_) => 6,
            Parameter::StrArray(_) => 7,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Parameter::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Parameter::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Parameter::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Parameter::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Parameter::IntArray(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_float_array(&self) -> Option<&[f32]> {
        match self {
            Parameter::FloatArray(value) => Some(value),
            _ => None,
        }
    }
}
