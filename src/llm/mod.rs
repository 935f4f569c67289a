//! Handling of AI-generated text
//!
//! The assistant suggests commands; this module turns its prose into command
//! lines the relay can run.

pub mod extract;

pub use extract::{code_blocks, extract_command, extract_script, CodeBlock};
