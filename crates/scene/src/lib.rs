pub mod components;
pub mod entity;
pub mod picking;
pub mod spatial;

mod world;

pub use world::*;
