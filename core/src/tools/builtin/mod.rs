//! Built-in tools

pub mod sum;

pub use sum::SumTool;

use crate::tools::Tool;
use std::sync::Arc;

/// All tools that ship with the library
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(SumTool::new())]
}
