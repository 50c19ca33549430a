pub mod method_descriptor;
pub use method_descriptor::*;

pub mod name_cache;
pub use name_cache::*;

pub mod method_library;
pub use method_library::*;

pub mod generic_binder;
pub use generic_binder::*;

pub mod method_resolver;
pub use method_resolver::*;
