//! Implementation of the shared memory arena for the expression nodes, aka a tape.
//! See https://rufflewind.com/2016-12-30/reverse-mode-automatic-differentiation
//!
//! Nodes are addressed by [`NodeId`], which is simply the position in the arena.
//! An operator can only be built from nodes that already exist, so each operand
//! has a strictly smaller id than the operator that consumes it. The graph is
//! therefore acyclic by construction, and ascending id order is a topological
//! order of any subgraph.

use std::{
    cell::{Cell, RefCell},
    fmt::{self, Display},
};

use log::trace;

use crate::{
    error::{GraphError, Result},
    unary_fn::CustomFn,
    BinaryOp, UnaryOp,
};

/// Index of a node in its [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("graph cannot hold more than u32::MAX nodes"))
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", u64::from(self.0) + 1)
    }
}

/// Operator kind accepted by [`Graph::combine`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OpKind {
    Unary(UnaryOp),
    Binary(BinaryOp),
}

impl OpKind {
    pub fn arity(&self) -> usize {
        match self {
            Self::Unary(_) => 1,
            Self::Binary(_) => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unary(op) => op.name(),
            Self::Binary(op) => op.name(),
        }
    }
}

impl Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<UnaryOp> for OpKind {
    fn from(op: UnaryOp) -> Self {
        Self::Unary(op)
    }
}

impl From<BinaryOp> for OpKind {
    fn from(op: BinaryOp) -> Self {
        Self::Binary(op)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Constant(f64),
    Variable(String),
    Unary(UnaryOp, NodeId),
    Binary(BinaryOp, NodeId, NodeId),
}

impl NodeKind {
    /// Operands in edge order. A node used twice appears twice.
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            Self::Constant(_) | Self::Variable(_) => vec![],
            Self::Unary(_, operand) => vec![*operand],
            Self::Binary(_, lhs, rhs) => vec![*lhs, *rhs],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Constant(_) | Self::Variable(_))
    }

    /// Human readable kind, e.g. `Constant: 5`, `Variable: x1` or `Mul`.
    pub fn label(&self) -> String {
        match self {
            Self::Constant(value) => format!("Constant: {value}"),
            Self::Variable(name) => format!("Variable: {name}"),
            Self::Unary(op, _) => op.name().to_string(),
            Self::Binary(op, _, _) => op.name().to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) data: Option<f64>,
    /// Local derivatives with respect to each operand, in edge order.
    pub(crate) local_grads: Vec<f64>,
    pub(crate) grad: Option<f64>,
    /// Forward pass that last wrote `data`.
    pub(crate) pass: Option<u64>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parents: vec![],
            data: None,
            local_grads: vec![],
            grad: None,
            pass: None,
        }
    }
}

/// An append-only arena of expression nodes.
///
/// Evaluation state lives in the nodes themselves, so the graph uses interior
/// mutability and every method takes `&self`. A `Graph` can be moved to another
/// thread, but it is not `Sync`; passes over one graph are serialized.
#[derive(Default, Debug)]
pub struct Graph {
    pub(crate) nodes: RefCell<Vec<Node>>,
    pub(crate) passes: Cell<u64>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_constant(&self, value: f64) -> NodeId {
        self.push(NodeKind::Constant(value))
    }

    /// The binding of `name` is looked up when the graph is evaluated, not here.
    pub fn make_variable(&self, name: impl Into<String>) -> NodeId {
        self.push(NodeKind::Variable(name.into()))
    }

    /// Build an operator node over `operands` and register it as a parent of
    /// each of them. The graph is left untouched on error.
    pub fn combine(&self, op: impl Into<OpKind>, operands: &[NodeId]) -> Result<NodeId> {
        let op = op.into();
        if operands.len() != op.arity() {
            return Err(GraphError::arity(op, operands.len()));
        }
        {
            let nodes = self.nodes.borrow();
            for &operand in operands {
                check_id(&nodes, operand)?;
            }
        }
        let kind = match (op, operands) {
            (OpKind::Unary(op), &[operand]) => NodeKind::Unary(op, operand),
            (OpKind::Binary(op), &[lhs, rhs]) => NodeKind::Binary(op, lhs, rhs),
            _ => return Err(GraphError::arity(op, operands.len())),
        };
        Ok(self.push(kind))
    }

    pub fn add(&self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.combine(BinaryOp::Add, &[lhs, rhs])
    }

    pub fn sub(&self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.combine(BinaryOp::Sub, &[lhs, rhs])
    }

    pub fn mul(&self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.combine(BinaryOp::Mul, &[lhs, rhs])
    }

    pub fn div(&self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.combine(BinaryOp::Div, &[lhs, rhs])
    }

    pub fn neg(&self, operand: NodeId) -> Result<NodeId> {
        self.combine(UnaryOp::Neg, &[operand])
    }

    pub fn exp(&self, operand: NodeId) -> Result<NodeId> {
        self.combine(UnaryOp::Exp, &[operand])
    }

    pub fn ln(&self, operand: NodeId) -> Result<NodeId> {
        self.combine(UnaryOp::Ln, &[operand])
    }

    pub fn sin(&self, operand: NodeId) -> Result<NodeId> {
        self.combine(UnaryOp::Sin, &[operand])
    }

    pub fn cos(&self, operand: NodeId) -> Result<NodeId> {
        self.combine(UnaryOp::Cos, &[operand])
    }

    pub fn tanh(&self, operand: NodeId) -> Result<NodeId> {
        self.combine(UnaryOp::Tanh, &[operand])
    }

    pub fn sigmoid(&self, operand: NodeId) -> Result<NodeId> {
        self.combine(UnaryOp::Sigmoid, &[operand])
    }

    /// Apply an arbitrary unary function given by its value and derivative.
    pub fn apply(
        &self,
        operand: NodeId,
        name: &'static str,
        f: fn(f64) -> f64,
        grad: fn(f64) -> f64,
    ) -> Result<NodeId> {
        self.combine(UnaryOp::Custom(CustomFn { name, f, grad }), &[operand])
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes
            .borrow()
            .get(id.index())
            .map(|node| node.kind.clone())
    }

    pub fn operands(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).map(|kind| kind.operands()).unwrap_or_default()
    }

    /// Nodes consuming `id`, one entry per edge.
    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .borrow()
            .get(id.index())
            .map(|node| node.parents.clone())
            .unwrap_or_default()
    }

    /// Value computed by the latest forward pass that reached `id`.
    pub fn value(&self, id: NodeId) -> Option<f64> {
        self.nodes.borrow().get(id.index()).and_then(|node| node.data)
    }

    /// Cached local derivatives with respect to each operand, in edge order.
    /// Empty for leaves and for nodes that were never evaluated.
    pub fn local_grads(&self, id: NodeId) -> Vec<f64> {
        self.nodes
            .borrow()
            .get(id.index())
            .map(|node| node.local_grads.clone())
            .unwrap_or_default()
    }

    /// Accumulated adjoint. Only meaningful once a `backward` call has returned.
    pub fn grad(&self, id: NodeId) -> Option<f64> {
        self.nodes.borrow().get(id.index()).and_then(|node| node.grad)
    }

    /// Infix rendering of the expression rooted at `id`.
    ///
    /// Leaves are written inline. An operator node used by more than one edge
    /// below `id` is written once as a `wN = ...; ` binding ahead of the
    /// expression and referred to by its id everywhere else, so squaring
    /// `a + b` prints as `w3 = (a + b); (w3 * w3)`.
    pub fn format_expr(&self, id: NodeId) -> Result<String> {
        use std::fmt::Write;
        let nodes = self.nodes.borrow();
        check_id(&nodes, id)?;
        let region = reachable(&nodes, id);
        let mut uses = vec![0usize; id.index() + 1];
        for node in &region {
            for operand in nodes[node.index()].kind.operands() {
                uses[operand.index()] += 1;
            }
        }
        let shared = |n: NodeId| uses[n.index()] > 1 && !nodes[n.index()].kind.is_leaf();
        let mut buf = String::new();
        for &node in region.iter().filter(|n| shared(**n)) {
            let _ = write!(buf, "{node} = ");
            write_expr(&nodes, node, &shared, &mut buf);
            buf.push_str("; ");
        }
        write_expr(&nodes, id, &shared, &mut buf);
        Ok(buf)
    }

    pub(crate) fn push(&self, kind: NodeKind) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId::from_index(nodes.len());
        for operand in kind.operands() {
            nodes[operand.index()].parents.push(id);
        }
        trace!("new node {id}: {}", kind.label());
        nodes.push(Node::new(kind));
        id
    }
}

pub(crate) fn check_id(nodes: &[Node], id: NodeId) -> Result<()> {
    if id.index() < nodes.len() {
        Ok(())
    } else {
        Err(GraphError::UnknownNode {
            node: id,
            len: nodes.len(),
        })
    }
}

/// Every node reachable from `root` through operand edges, in ascending id
/// order (operands before the operators consuming them).
pub(crate) fn reachable(nodes: &[Node], root: NodeId) -> Vec<NodeId> {
    let mut visited = vec![false; root.index() + 1];
    let mut stack = vec![root];
    visited[root.index()] = true;
    while let Some(id) = stack.pop() {
        for operand in nodes[id.index()].kind.operands() {
            if !visited[operand.index()] {
                visited[operand.index()] = true;
                stack.push(operand);
            }
        }
    }
    visited
        .iter()
        .enumerate()
        .filter(|(_, v)| **v)
        .map(|(i, _)| NodeId::from_index(i))
        .collect()
}

/// Writes the infix form of `root`. Operands for which `by_id` holds are
/// written as their id instead of being expanded.
pub(crate) fn write_expr(
    nodes: &[Node],
    root: NodeId,
    by_id: impl Fn(NodeId) -> bool,
    buf: &mut String,
) {
    use std::fmt::Write;

    enum Item {
        Expand(NodeId),
        Text(&'static str),
        Symbol(BinaryOp),
    }

    let mut stack = vec![Item::Expand(root)];
    while let Some(item) = stack.pop() {
        let id = match item {
            Item::Expand(id) => id,
            Item::Text(text) => {
                buf.push_str(text);
                continue;
            }
            Item::Symbol(op) => {
                let _ = write!(buf, " {} ", op.symbol());
                continue;
            }
        };
        if id != root && by_id(id) {
            let _ = write!(buf, "{id}");
            continue;
        }
        match &nodes[id.index()].kind {
            NodeKind::Constant(value) => {
                let _ = write!(buf, "{value}");
            }
            NodeKind::Variable(name) => buf.push_str(name),
            NodeKind::Unary(UnaryOp::Neg, operand) => {
                buf.push('-');
                stack.push(Item::Expand(*operand));
            }
            NodeKind::Unary(op, operand) => {
                buf.push_str(&op.name().to_lowercase());
                buf.push('(');
                stack.push(Item::Text(")"));
                stack.push(Item::Expand(*operand));
            }
            NodeKind::Binary(op, lhs, rhs) => {
                buf.push('(');
                stack.push(Item::Text(")"));
                stack.push(Item::Expand(*rhs));
                stack.push(Item::Symbol(*op));
                stack.push(Item::Expand(*lhs));
            }
        }
    }
}
