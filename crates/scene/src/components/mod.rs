pub mod bounds;
pub mod layer_tag;
pub mod marker;
pub mod properties;
pub mod transform;
pub mod vector_geometry;
pub mod visibility;

pub use bounds::*;
pub use layer_tag::*;
pub use marker::*;
pub use properties::*;
pub use transform::*;
pub use vector_geometry::*;
pub use visibility::*;
