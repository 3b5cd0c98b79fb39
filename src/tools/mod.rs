//! External tool collaborators.
//!
//! | Operation | Tool | Input | Output |
//! |---|---|---|---|
//! | **Literate conversion** | `literate-c <file> 0` | source path | markdown on stdout |
//! | **Typeset** | `pandoc ... -o <out>` | markdown on stdin | HTML file |
//! | **Annotate** | `awk -v tags=<t> -f decl_anchors.awk` | HTML on stdin | HTML on stdout |
//!
//! The module is split into:
//! - **Parameters**: [`TypesetParams`], the engine's flags and named variables
//! - **Backend**: [`DocTools`] trait + [`ToolError`]
//! - **Command**: [`CommandTools`], the subprocess implementation with timeouts

pub mod backend;
pub mod command;
mod params;

pub use backend::{DocTools, ToolError};
pub use command::CommandTools;
pub use params::{INDEX_FORMAT, PAGE_FORMAT, TypesetParams};
