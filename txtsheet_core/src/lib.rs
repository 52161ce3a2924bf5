//! `txtsheet_core` compiles a lightweight outline language (headings, indented
//! list items, fenced yaml parameter blocks, conditional compilation
//! directives and file inclusion) into a validated document tree ready for
//! spreadsheet rendering.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Entry file
//!   -> Comment stripper (`//` then `/* */`, locations preserved)
//!   -> Directive engine (@define, @undef, @if, @elif, @else, @end, @error)
//!   -> Includer (`<<[project:path](params)`, recursively re-running the above)
//!   -> Document parser (headings, column headers, items, yaml blocks, variables)
//!   -> Initial value resolver (column defaults and rules per leaf item)
//! ```
//!
//! ## Modules
//!
//! - [`config`] loads the YAML seed configuration, including `$include` merging.
//! - [`project`] maps `<root>/<project>/source/<path>` files to their
//!   project-relative names.
//!
//! ## Key Types
//!
//! - [`SourceLine`] is one line of the annotated stream with its origin.
//! - [`DirectiveEngine`] is the per-file conditional compilation state machine.
//! - [`Preprocessor`] drives comment stripping, directives and includes.
//! - [`Document`] is the arena of [`Node`]s produced by [`parse_lines`].
//! - [`Compilation`] bundles the line stream, the tree and the uid rewrites.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use txtsheet_core::CompileOptions;
//! use txtsheet_core::compile_file;
//!
//! let options = CompileOptions::default();
//! let compilation = compile_file(Path::new("root/app/source/main.txt"), &options).unwrap();
//!
//! for (file, rewrites) in compilation.rewrites.iter() {
//! 	println!("{file}: {} line(s) need an id", rewrites.len());
//! }
//! ```

pub use comments::*;
pub use config::*;
pub use directives::*;
pub use engine::*;
pub use error::*;
pub use formula::*;
pub use include::*;
pub use initial_values::*;
pub use parser::*;
pub use preprocess::*;
pub use project::*;
pub use source::*;
pub use tree::*;
pub use value::*;

mod comments;
pub mod config;
mod directives;
mod engine;
#[allow(unused_assignments)]
mod error;
mod formula;
mod include;
mod initial_values;
pub(crate) mod lexer;
mod parser;
mod preprocess;
pub mod project;
mod source;
mod tree;
mod value;

#[cfg(test)]
mod __fixtures;
