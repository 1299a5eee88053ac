//! Reverse-mode automatic differentiation over a DAG of scalar expressions.
//!
//! Build an expression in a [`Graph`], evaluate it with [`Graph::forward`],
//! then call [`Graph::backward`] to get the derivative of the root with
//! respect to every node it depends on. Nodes shared by several operators
//! receive the sum of the contributions of all of them.

mod binary_fn;
mod dot;
mod env;
pub mod error;
mod eval;
pub mod graph;
mod term;
mod unary_fn;

pub use binary_fn::BinaryOp;
pub use dot::{DotBuilder, EdgeLabel, NodeLabel};
pub use env::Environment;
pub use error::{GraphError, Result};
pub use graph::{Graph, NodeId, NodeKind, OpKind};
pub use term::Term;
pub use unary_fn::{CustomFn, UnaryOp};

#[cfg(feature = "macro")]
pub use dagrad_macro::dagrad;
