pub mod install;
pub mod logs;
pub mod settings;
