pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{apply_patches, build_patcher, check_patches, ApplicationError};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    AnchorEntry, InsertEntry, Metadata, PatchConfig, PatchDefinition, ValidationError,
    ValidationIssue,
};
