//! LoRA adapter files: FlatBuffers serialization of named parameter tensors.

pub mod adapter;
pub mod import;
pub mod schema;
pub mod tensor;

pub use adapter::{
    deserialize_adapter, load_lora_params_from_flatbuffers, save_array_as_lora_parameter,
    save_lora_params_to_flatbuffers, save_lora_params_with_versions, serialize_adapter,
    AdapterFile, LoraParams, DEFAULT_ADAPTER_VERSION, DEFAULT_MODEL_VERSION,
};
pub use import::{lora_params_from_safetensors, lora_params_from_safetensors_bytes};
pub use schema::{ADAPTER_FILE_IDENTIFIER, ADAPTER_FORMAT_VERSION};
pub use tensor::{LoraTensor, TensorDataType};
