//! The extraction language compiler.
//!
//! Converts the command-line argument vector into an immutable tree of
//! [`Block`]s, each carrying a visit path, an optional position constraint,
//! a condition list, a command list, an optional `-else` failure list, and
//! nested child blocks. Compilation is pure classification; no side
//! effects, and every failure is a [`QueryError`] value carrying the
//! offending argument (the executor and binary never see a malformed
//! program).

pub mod compile;
pub mod coords;
pub mod ops;

pub use compile::compile;
pub use ops::{
    Block, Clause, CompKind, Comparator, Condition, CondKind, Level, OpKind, Operation, Position,
    Step, StepKind,
};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("no -pattern command")]
    MissingPattern,
    #[error("more than one -pattern command")]
    DuplicatePattern,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("missing argument after '{0}'")]
    MissingOperand(String),
    #[error("misplaced '{0}'")]
    Misplaced(String),
    #[error("illegal position '{0}'")]
    BadPosition(String),
    #[error("-position cannot be combined with -if or -unless")]
    PositionWithCondition,
    #[error("comparison command '{0}' without a right-hand side")]
    DanglingComparator(String),
    #[error("variable name '{0}' must be uppercase letters and digits")]
    BadVariableName(String),
    #[error("'{0}' is not a registered sequence coordinate selector")]
    UnknownCoordinate(String),
    #[error("exploration command '{0}' given before -pattern")]
    EarlyExploration(String),
}
