use crate::lora::schema::{self, AdapterTable, ADAPTER_FILE_IDENTIFIER, ADAPTER_FORMAT_VERSION};
use crate::lora::tensor::{LoraTensor, TensorDataType};
use crate::utils::error::{Result, ToolsError};
use crate::utils::validation::Validate;
use flatbuffers::FlatBufferBuilder;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Parameters keyed by name; serialized in name order.
pub type LoraParams = BTreeMap<String, LoraTensor>;

pub const DEFAULT_ADAPTER_VERSION: i32 = 1;
pub const DEFAULT_MODEL_VERSION: i32 = 1;

/// Root offset plus the file identifier.
const HEADER_LEN: usize = 8;

/// `raw_data` payloads start on this boundary so tensors can be read in place.
const RAW_DATA_ALIGNMENT: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterFile {
    pub format_version: i32,
    pub adapter_version: i32,
    pub model_version: i32,
    pub parameters: LoraParams,
}

impl Validate for AdapterFile {
    fn validate(&self) -> Result<()> {
        if self.format_version != ADAPTER_FORMAT_VERSION {
            return Err(ToolsError::UnsupportedFormatError {
                message: format!(
                    "adapter format version {} (expected {})",
                    self.format_version, ADAPTER_FORMAT_VERSION
                ),
            });
        }
        for (name, tensor) in &self.parameters {
            validate_parameter(name, tensor)?;
        }
        Ok(())
    }
}

fn validate_parameter(name: &str, tensor: &LoraTensor) -> Result<()> {
    if name.is_empty() {
        return Err(ToolsError::InvalidParameterError {
            name: name.to_string(),
            reason: "parameter name cannot be empty".to_string(),
        });
    }
    tensor.validate_as(name)
}

pub fn serialize_adapter(
    params: &LoraParams,
    adapter_version: i32,
    model_version: i32,
) -> Result<Vec<u8>> {
    for (name, tensor) in params {
        validate_parameter(name, tensor)?;
    }

    let payload: usize = params.values().map(|t| t.raw_data().len()).sum();
    let mut fbb = FlatBufferBuilder::with_capacity(payload + 1024);

    let offsets: Vec<_> = params
        .iter()
        .map(|(name, tensor)| {
            let name = fbb.create_string(name);
            let dims = fbb.create_vector(tensor.dims());
            pad_for_raw_data(&mut fbb, tensor.raw_data().len());
            let raw_data = fbb.create_vector(tensor.raw_data());
            schema::create_parameter(
                &mut fbb,
                name,
                dims,
                tensor.data_type() as i32,
                raw_data,
            )
        })
        .collect();
    let parameters = fbb.create_vector(&offsets);
    let root = schema::create_adapter(
        &mut fbb,
        ADAPTER_FORMAT_VERSION,
        adapter_version,
        model_version,
        parameters,
    );
    fbb.finish(root, Some(ADAPTER_FILE_IDENTIFIER));

    Ok(fbb.finished_data().to_vec())
}

/// The builder writes back to front, and the finished buffer length is a
/// multiple of 8 once an `int64` dims vector has been written. Padding here
/// leaves the next `[uint8]` vector's payload 8-aligned from the buffer start.
fn pad_for_raw_data(fbb: &mut FlatBufferBuilder, len: usize) {
    let used = fbb.unfinished_data().len();
    let padding = (RAW_DATA_ALIGNMENT - (used + len) % RAW_DATA_ALIGNMENT) % RAW_DATA_ALIGNMENT;
    for _ in 0..padding {
        fbb.push(0u8);
    }
}

pub fn deserialize_adapter(bytes: &[u8]) -> Result<AdapterFile> {
    if bytes.len() < HEADER_LEN
        || !flatbuffers::buffer_has_identifier(bytes, ADAPTER_FILE_IDENTIFIER, false)
    {
        return Err(ToolsError::UnsupportedFormatError {
            message: format!("missing '{}' file identifier", ADAPTER_FILE_IDENTIFIER),
        });
    }

    let adapter = flatbuffers::root::<AdapterTable>(bytes)?;
    let mut parameters = LoraParams::new();

    if let Some(tables) = adapter.parameters() {
        for table in tables.iter() {
            let name = table.name().unwrap_or_default().to_string();
            let data_type = TensorDataType::from_i32(table.data_type()).ok_or_else(|| {
                ToolsError::InvalidParameterError {
                    name: name.clone(),
                    reason: format!("unknown data type {}", table.data_type()),
                }
            })?;
            let dims: Vec<i64> = table.dims().map(|d| d.iter().collect()).unwrap_or_default();
            let raw_data = table
                .raw_data()
                .map(|data| data.bytes().to_vec())
                .unwrap_or_default();

            let tensor = LoraTensor::from_parts(dims, data_type, raw_data);
            if parameters.insert(name.clone(), tensor).is_some() {
                return Err(ToolsError::InvalidParameterError {
                    name,
                    reason: "duplicate parameter name".to_string(),
                });
            }
        }
    }

    let file = AdapterFile {
        format_version: adapter.format_version(),
        adapter_version: adapter.adapter_version(),
        model_version: adapter.model_version(),
        parameters,
    };
    file.validate()?;
    Ok(file)
}

/// Writes `params` as a LoRA adapter file (adapter and model version 1).
pub fn save_lora_params_to_flatbuffers(params: &LoraParams, file_name: impl AsRef<Path>) -> Result<()> {
    save_lora_params_with_versions(
        params,
        file_name,
        DEFAULT_ADAPTER_VERSION,
        DEFAULT_MODEL_VERSION,
    )
}

pub fn save_lora_params_with_versions(
    params: &LoraParams,
    file_name: impl AsRef<Path>,
    adapter_version: i32,
    model_version: i32,
) -> Result<()> {
    let path = file_name.as_ref();
    let bytes = serialize_adapter(params, adapter_version, model_version)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, &bytes)?;

    info!(
        "Saved {} LoRA parameters ({} bytes) to {}",
        params.len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

pub fn save_array_as_lora_parameter(
    tensor: &LoraTensor,
    name: &str,
    file_name: impl AsRef<Path>,
) -> Result<()> {
    let mut params = LoraParams::new();
    params.insert(name.to_string(), tensor.clone());
    save_lora_params_to_flatbuffers(&params, file_name)
}

pub fn load_lora_params_from_flatbuffers(file_name: impl AsRef<Path>) -> Result<AdapterFile> {
    let path = file_name.as_ref();
    let bytes = fs::read(path)?;
    let adapter = deserialize_adapter(&bytes)?;
    debug!(
        "Loaded {} LoRA parameters from {}",
        adapter.parameters.len(),
        path.display()
    );
    Ok(adapter)
}
