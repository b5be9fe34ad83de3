pub mod android;
pub mod config;
pub mod lora;
pub mod utils;

pub use android::*;
pub use lora::save_lora_params_to_flatbuffers;
pub use utils::logger::get_logger;
pub use utils::platform::{is_linux, is_mac, is_windows};
pub use utils::run::run;
