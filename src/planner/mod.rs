pub mod table_namer;
pub use table_namer::*;

pub mod column_usage;
pub use column_usage::*;

pub mod query_parts;
pub use query_parts::*;

pub mod plan_fragment;
pub use plan_fragment::*;

pub mod field_splitter;
pub use field_splitter::*;

pub mod join_rewriter;
pub use join_rewriter::*;

pub mod group_by_rewriter;
pub use group_by_rewriter::*;

pub mod set_operator_rewriter;
pub use set_operator_rewriter::*;

pub mod rewrite_pass;
pub use rewrite_pass::*;
