pub mod audio;
pub mod sampler;
pub mod storage;
pub mod types;

pub use audio::*;
pub use sampler::*;
pub use storage::*;
pub use types::*;
