use thiserror::Error;

use crate::{graph::NodeId, OpKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("{op} takes {expected} operand(s), but {actual} were given")]
    Arity {
        op: OpKind,
        expected: usize,
        actual: usize,
    },

    #[error("Node {node} does not belong to this graph of {len} nodes")]
    UnknownNode { node: NodeId, len: usize },

    #[error("Variable \"{name}\" ({node}) is not bound in the environment")]
    UnboundVariable { name: String, node: NodeId },

    #[error("Value of {node} is not defined in the forward pass. Call `forward()` before `backward()`.")]
    NotEvaluated { node: NodeId },
}

impl GraphError {
    pub(crate) fn arity(op: OpKind, actual: usize) -> Self {
        GraphError::Arity {
            op,
            expected: op.arity(),
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
