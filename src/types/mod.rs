pub mod runtime_type;
pub use runtime_type::*;

pub mod type_catalog;
pub use type_catalog::*;

pub mod compatibility;
pub use compatibility::*;
