pub mod commands;
pub mod config;
pub mod defaults;
pub mod document;
pub mod error;
pub mod fs_atomic;
pub mod installer;
pub mod logging;
pub mod path_utils;
pub mod reconcile;
pub mod server;
pub mod store;
pub mod update;

pub use document::SettingsDocument;
pub use error::{ErrorKind, SettingsError};
pub use reconcile::{clamp_output_tokens, merge, normalize_for_write, to_display_shape, LegacyView};
pub use store::SettingsStore;
pub use update::{PermissionMode, SettingsUpdate, SettingsUpdateBuilder, ToolHookEvent};
