pub mod audio_params;
pub mod engine;
pub mod ipc;
pub mod loader;
pub mod plugin;
pub mod soundbank;

pub use audio_params::*;
pub use engine::*;
pub use ipc::*;
pub use loader::*;
pub use plugin::*;
pub use soundbank::*;
