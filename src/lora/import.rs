use crate::lora::adapter::LoraParams;
use crate::lora::tensor::{LoraTensor, TensorDataType};
use crate::utils::error::{Result, ToolsError};
use safetensors::{Dtype, SafeTensors};
use std::path::Path;
use tracing::debug;

fn data_type_for(dtype: Dtype) -> Option<TensorDataType> {
    let data_type = match dtype {
        Dtype::BOOL => TensorDataType::Bool,
        Dtype::U8 => TensorDataType::Uint8,
        Dtype::I8 => TensorDataType::Int8,
        Dtype::U16 => TensorDataType::Uint16,
        Dtype::I16 => TensorDataType::Int16,
        Dtype::F16 => TensorDataType::Float16,
        Dtype::BF16 => TensorDataType::Bfloat16,
        Dtype::U32 => TensorDataType::Uint32,
        Dtype::I32 => TensorDataType::Int32,
        Dtype::F32 => TensorDataType::Float,
        Dtype::U64 => TensorDataType::Uint64,
        Dtype::I64 => TensorDataType::Int64,
        Dtype::F64 => TensorDataType::Double,
        Dtype::F8_E4M3 => TensorDataType::Float8E4M3FN,
        Dtype::F8_E5M2 => TensorDataType::Float8E5M2,
        _ => return None,
    };
    Some(data_type)
}

/// Reads every tensor of a `.safetensors` file (e.g. a PEFT `adapter_model.safetensors`).
pub fn lora_params_from_safetensors(path: impl AsRef<Path>) -> Result<LoraParams> {
    let bytes = std::fs::read(path.as_ref())?;
    lora_params_from_safetensors_bytes(&bytes)
}

pub fn lora_params_from_safetensors_bytes(bytes: &[u8]) -> Result<LoraParams> {
    let tensors = SafeTensors::deserialize(bytes)?;
    let mut params = LoraParams::new();

    for (name, view) in tensors.tensors() {
        let data_type =
            data_type_for(view.dtype()).ok_or_else(|| ToolsError::UnsupportedFormatError {
                message: format!("tensor '{}' has unsupported dtype {:?}", name, view.dtype()),
            })?;
        let dims = view.shape().iter().map(|dim| *dim as i64).collect();

        let tensor = LoraTensor::from_parts(dims, data_type, view.data().to_vec());
        tensor.validate_as(&name)?;
        debug!("Imported {} {:?} {}", name, tensor.dims(), data_type);
        params.insert(name, tensor);
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetensors::tensor::TensorView;

    #[test]
    fn test_import_f32_and_f16() {
        let a: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let b: Vec<u8> = [half::f16::from_f32(0.25), half::f16::from_f32(0.75)]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();

        let views = vec![
            ("lora_A", TensorView::new(Dtype::F32, vec![2, 2], &a).unwrap()),
            ("lora_B", TensorView::new(Dtype::F16, vec![1, 2], &b).unwrap()),
        ];
        let bytes = safetensors::serialize(views, &None).unwrap();

        let params = lora_params_from_safetensors_bytes(&bytes).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["lora_A"].dims(), &[2, 2]);
        assert_eq!(params["lora_A"].to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(params["lora_B"].data_type(), TensorDataType::Float16);
        assert_eq!(params["lora_B"].to_f32_vec().unwrap(), vec![0.25, 0.75]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            lora_params_from_safetensors_bytes(b"not a safetensors file").unwrap_err(),
            ToolsError::SafeTensorsError(_)
        ));
    }
}
