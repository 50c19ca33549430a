pub mod column_resolver;
pub use column_resolver::*;

pub mod member_resolver;
pub use member_resolver::*;

pub mod operator_resolver;
pub use operator_resolver::*;

pub mod method_binder;
pub use method_binder::*;

pub mod source_resolver;
pub use source_resolver::*;

pub mod projection_resolver;
pub use projection_resolver::*;

pub mod clause_validator;
pub use clause_validator::*;

pub mod pushdown_resolver;
pub use pushdown_resolver::*;
