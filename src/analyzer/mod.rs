pub mod analyzer_error;
pub use analyzer_error::*;

pub mod diagnostics;
pub use diagnostics::*;

pub mod suggestions;
pub use suggestions::*;

pub mod table_symbol;
pub use table_symbol::*;

pub mod scope;
pub use scope::*;

pub mod analyzed_query;
pub use analyzed_query::*;

pub mod analysis_context;
pub use analysis_context::*;

pub mod resolvers;
pub use resolvers::*;

pub mod semantic_pass;
pub use semantic_pass::*;
