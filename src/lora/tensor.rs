use crate::utils::error::{Result, ToolsError};
use half::{bf16, f16};
use std::fmt;

/// Element type of a serialized tensor. Values follow ONNX `TensorProto.DataType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TensorDataType {
    Undefined = 0,
    Float = 1,
    Uint8 = 2,
    Int8 = 3,
    Uint16 = 4,
    Int16 = 5,
    Int32 = 6,
    Int64 = 7,
    String = 8,
    Bool = 9,
    Float16 = 10,
    Double = 11,
    Uint32 = 12,
    Uint64 = 13,
    Complex64 = 14,
    Complex128 = 15,
    Bfloat16 = 16,
    Float8E4M3FN = 17,
    Float8E4M3FNUZ = 18,
    Float8E5M2 = 19,
    Float8E5M2FNUZ = 20,
}

impl TensorDataType {
    pub fn from_i32(value: i32) -> Option<Self> {
        use TensorDataType::*;
        let data_type = match value {
            0 => Undefined,
            1 => Float,
            2 => Uint8,
            3 => Int8,
            4 => Uint16,
            5 => Int16,
            6 => Int32,
            7 => Int64,
            8 => String,
            9 => Bool,
            10 => Float16,
            11 => Double,
            12 => Uint32,
            13 => Uint64,
            14 => Complex64,
            15 => Complex128,
            16 => Bfloat16,
            17 => Float8E4M3FN,
            18 => Float8E4M3FNUZ,
            19 => Float8E5M2,
            20 => Float8E5M2FNUZ,
            _ => return None,
        };
        Some(data_type)
    }

    /// Bytes per element; `None` for types that cannot be stored as raw data.
    pub fn element_size(&self) -> Option<usize> {
        use TensorDataType::*;
        match self {
            Undefined | String => None,
            Uint8 | Int8 | Bool | Float8E4M3FN | Float8E4M3FNUZ | Float8E5M2 | Float8E5M2FNUZ => {
                Some(1)
            }
            Uint16 | Int16 | Float16 | Bfloat16 => Some(2),
            Float | Int32 | Uint32 => Some(4),
            Int64 | Uint64 | Double | Complex64 => Some(8),
            Complex128 => Some(16),
        }
    }

    pub fn name(&self) -> &'static str {
        use TensorDataType::*;
        match self {
            Undefined => "UNDEFINED",
            Float => "FLOAT",
            Uint8 => "UINT8",
            Int8 => "INT8",
            Uint16 => "UINT16",
            Int16 => "INT16",
            Int32 => "INT32",
            Int64 => "INT64",
            String => "STRING",
            Bool => "BOOL",
            Float16 => "FLOAT16",
            Double => "DOUBLE",
            Uint32 => "UINT32",
            Uint64 => "UINT64",
            Complex64 => "COMPLEX64",
            Complex128 => "COMPLEX128",
            Bfloat16 => "BFLOAT16",
            Float8E4M3FN => "FLOAT8E4M3FN",
            Float8E4M3FNUZ => "FLOAT8E4M3FNUZ",
            Float8E5M2 => "FLOAT8E5M2",
            Float8E5M2FNUZ => "FLOAT8E5M2FNUZ",
        }
    }
}

impl fmt::Display for TensorDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dense tensor stored as little-endian raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoraTensor {
    dims: Vec<i64>,
    data_type: TensorDataType,
    raw_data: Vec<u8>,
}

impl LoraTensor {
    pub fn from_raw(dims: Vec<i64>, data_type: TensorDataType, raw_data: Vec<u8>) -> Result<Self> {
        let tensor = Self::from_parts(dims, data_type, raw_data);
        tensor.validate_as("<tensor>")?;
        Ok(tensor)
    }

    /// Unvalidated; callers run [`LoraTensor::validate_as`] before use.
    pub(crate) fn from_parts(dims: Vec<i64>, data_type: TensorDataType, raw_data: Vec<u8>) -> Self {
        Self {
            dims,
            data_type,
            raw_data,
        }
    }

    pub fn from_f32(dims: Vec<i64>, values: &[f32]) -> Result<Self> {
        let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_raw(dims, TensorDataType::Float, raw)
    }

    pub fn from_f16(dims: Vec<i64>, values: &[f16]) -> Result<Self> {
        let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_raw(dims, TensorDataType::Float16, raw)
    }

    pub fn from_bf16(dims: Vec<i64>, values: &[bf16]) -> Result<Self> {
        let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_raw(dims, TensorDataType::Bfloat16, raw)
    }

    pub fn from_f64(dims: Vec<i64>, values: &[f64]) -> Result<Self> {
        let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_raw(dims, TensorDataType::Double, raw)
    }

    pub fn from_i32(dims: Vec<i64>, values: &[i32]) -> Result<Self> {
        let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_raw(dims, TensorDataType::Int32, raw)
    }

    pub fn from_i64(dims: Vec<i64>, values: &[i64]) -> Result<Self> {
        let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_raw(dims, TensorDataType::Int64, raw)
    }

    pub fn from_u8(dims: Vec<i64>, values: &[u8]) -> Result<Self> {
        Self::from_raw(dims, TensorDataType::Uint8, values.to_vec())
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    pub fn data_type(&self) -> TensorDataType {
        self.data_type
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    /// Product of dims; a tensor without dims is a scalar.
    pub fn element_count(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, dim| {
            usize::try_from(*dim).ok().and_then(|dim| acc.checked_mul(dim))
        })
    }

    /// Checks that the raw data matches dims and data type, reporting errors under `name`.
    pub fn validate_as(&self, name: &str) -> Result<()> {
        let invalid = |reason: String| ToolsError::InvalidParameterError {
            name: name.to_string(),
            reason,
        };

        if let Some(dim) = self.dims.iter().find(|dim| **dim < 0) {
            return Err(invalid(format!("negative dimension {} in {:?}", dim, self.dims)));
        }
        let element_size = self.data_type.element_size().ok_or_else(|| {
            invalid(format!(
                "data type {} cannot be stored as raw data",
                self.data_type
            ))
        })?;
        let expected = self
            .element_count()
            .and_then(|count| count.checked_mul(element_size))
            .ok_or_else(|| invalid(format!("dims {:?} overflow", self.dims)))?;
        if expected != self.raw_data.len() {
            return Err(invalid(format!(
                "dims {:?} of {} need {} bytes, got {}",
                self.dims,
                self.data_type,
                expected,
                self.raw_data.len()
            )));
        }
        Ok(())
    }

    /// Decodes floating point data as `f32`.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        let values = match self.data_type {
            TensorDataType::Float => self
                .raw_data
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
            TensorDataType::Float16 => self
                .raw_data
                .chunks_exact(2)
                .map(|chunk| f16::from_le_bytes([chunk[0], chunk[1]]).to_f32())
                .collect(),
            TensorDataType::Bfloat16 => self
                .raw_data
                .chunks_exact(2)
                .map(|chunk| bf16::from_le_bytes([chunk[0], chunk[1]]).to_f32())
                .collect(),
            TensorDataType::Double => self
                .raw_data
                .chunks_exact(8)
                .map(|chunk| {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(chunk);
                    f64::from_le_bytes(bytes) as f32
                })
                .collect(),
            other => {
                return Err(ToolsError::UnsupportedFormatError {
                    message: format!("cannot convert {} data to f32", other),
                })
            }
        };
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_codes() {
        for code in 0..=20 {
            let data_type = TensorDataType::from_i32(code).unwrap();
            assert_eq!(data_type as i32, code);
        }
        assert!(TensorDataType::from_i32(21).is_none());
        assert_eq!(TensorDataType::Float16.to_string(), "FLOAT16");
        assert_eq!(TensorDataType::String.element_size(), None);
    }

    #[test]
    fn test_from_f32_layout() {
        let tensor = LoraTensor::from_f32(vec![2, 2], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(tensor.raw_data().len(), 16);
        assert_eq!(&tensor.raw_data()[..4], &1.0f32.to_le_bytes());
        assert_eq!(tensor.element_count(), Some(4));
        assert_eq!(tensor.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_half_precision_decodes() {
        let values = [f16::from_f32(0.5), f16::from_f32(-2.0)];
        let tensor = LoraTensor::from_f16(vec![2], &values).unwrap();
        assert_eq!(tensor.data_type(), TensorDataType::Float16);
        assert_eq!(tensor.to_f32_vec().unwrap(), vec![0.5, -2.0]);

        let tensor = LoraTensor::from_bf16(vec![1, 1], &[bf16::from_f32(3.0)]).unwrap();
        assert_eq!(tensor.to_f32_vec().unwrap(), vec![3.0]);
    }

    #[test]
    fn test_scalar_and_empty_tensors() {
        let scalar = LoraTensor::from_i64(vec![], &[7]).unwrap();
        assert_eq!(scalar.element_count(), Some(1));

        let empty = LoraTensor::from_f32(vec![0, 8], &[]).unwrap();
        assert!(empty.raw_data().is_empty());
    }

    #[test]
    fn test_mismatched_layout_rejected() {
        let err = LoraTensor::from_f32(vec![3], &[1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("need 12 bytes, got 8"));

        assert!(LoraTensor::from_raw(vec![-1], TensorDataType::Uint8, vec![]).is_err());
        assert!(LoraTensor::from_raw(vec![1], TensorDataType::String, vec![0]).is_err());
        assert!(LoraTensor::from_i64(vec![1], &[1]).unwrap().to_f32_vec().is_err());
    }
}
