//! Map engine adapters: one contract over the planar (2D) and globe (3D) backends.

mod adapter;
mod defaults;
mod error;
pub mod globe;
pub mod planar;
pub mod registry;
mod transition;

pub use adapter::*;
pub use defaults::EngineDefaults;
pub use error::{EngineError, EngineResult};
pub use registry::EngineRegistry;
pub use transition::Transition;
