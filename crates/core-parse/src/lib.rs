//! Record parsing: a table-driven XML tokenizer, an arena ("farm") tree
//! builder, and the streaming passes (`format`, `outline`, `synopsis`,
//! `verify`, `filter`) that run on token events without building a tree.
//!
//! The in-memory tokenizer borrows every name, attribute run, and content
//! slice straight from the record string; one record's whole node graph is
//! freed by dropping its farm.

pub mod stream;
pub mod token;
pub mod tree;

pub use token::{StreamEvent, StreamTokenizer, Token, Tokenizer};
pub use tree::{BuildOptions, Farm, Node, NodeId, Tree, build_tree};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Split(#[from] core_split::SplitError),
    #[error("write failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("record has no top-level element")]
    NoRoot,
}
