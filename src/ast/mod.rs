pub mod literal;
pub use literal::*;

pub mod operators;
pub use operators::*;

pub mod node;
pub use node::*;

pub mod display;

pub mod traversal;
pub use traversal::*;

pub mod builders;
pub use builders::*;
