pub mod config;
pub mod conversion;
pub mod converter;
pub mod metrics;
pub mod orchestrator;
pub mod process;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, ServerConfig, StorageConfig,
};
pub use conversion::{
    Conversion, ConversionError, ConversionHandle, ConversionStatus, InputKind, InputSource,
    NewConversion,
};
pub use converter::{CommandToolkit, MediaKind, MediaToolkit, OutputOptions, ToolkitConfig};
pub use orchestrator::{ConversionOrchestrator, OrchestratorConfig, StatusSnapshot};
pub use process::{run_command, ProcessError};
pub use store::{ConversionStore, JsonFileStore, StoreError};
