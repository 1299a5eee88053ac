use std::{
    fmt,
    ops::{Add, Div, Mul, Neg, Sub},
};

use crate::{
    dot::DotBuilder,
    error::Result,
    graph::{Graph, NodeId, NodeKind},
    unary_fn::CustomFn,
    BinaryOp, Environment, UnaryOp,
};

/// A handle to a node that lets expressions be written with infix operators.
///
/// ```
/// use dagrad::Graph;
///
/// let graph = Graph::new();
/// let x = graph.variable("x");
/// let y = x * x + 1.;
/// assert_eq!(y.forward(&[("x", 3.)]).unwrap(), 10.);
/// y.backprop().unwrap();
/// assert_eq!(x.grad(), Some(6.));
/// ```
#[derive(Clone, Copy)]
pub struct Term<'a> {
    graph: &'a Graph,
    id: NodeId,
}

impl Graph {
    pub fn constant(&self, value: f64) -> Term<'_> {
        Term {
            graph: self,
            id: self.make_constant(value),
        }
    }

    pub fn variable(&self, name: impl Into<String>) -> Term<'_> {
        Term {
            graph: self,
            id: self.make_variable(name),
        }
    }

    /// Wrap an existing node, if it belongs to this graph.
    pub fn term(&self, id: NodeId) -> Option<Term<'_>> {
        self.contains(id).then_some(Term { graph: self, id })
    }
}

impl<'a> Term<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    pub fn forward<E: Environment + ?Sized>(&self, env: &E) -> Result<f64> {
        self.graph.forward(self.id, env)
    }

    pub fn backward(&self, seed: f64) -> Result<()> {
        self.graph.backward(self.id, seed)
    }

    pub fn backprop(&self) -> Result<()> {
        self.graph.backprop(self.id)
    }

    pub fn value(&self) -> Option<f64> {
        self.graph.value(self.id)
    }

    pub fn grad(&self) -> Option<f64> {
        self.graph.grad(self.id)
    }

    pub fn dot_builder(&self) -> DotBuilder<'a> {
        self.graph.dot_builder(self.id)
    }

    pub fn exp(self) -> Self {
        self.unary(UnaryOp::Exp)
    }

    pub fn ln(self) -> Self {
        self.unary(UnaryOp::Ln)
    }

    pub fn sin(self) -> Self {
        self.unary(UnaryOp::Sin)
    }

    pub fn cos(self) -> Self {
        self.unary(UnaryOp::Cos)
    }

    pub fn tanh(self) -> Self {
        self.unary(UnaryOp::Tanh)
    }

    pub fn sigmoid(self) -> Self {
        self.unary(UnaryOp::Sigmoid)
    }

    pub fn apply(self, name: &'static str, f: fn(f64) -> f64, grad: fn(f64) -> f64) -> Self {
        self.unary(UnaryOp::Custom(CustomFn { name, f, grad }))
    }

    fn unary(self, op: UnaryOp) -> Self {
        self.with(NodeKind::Unary(op, self.id))
    }

    fn binary(self, op: BinaryOp, rhs: Self) -> Self {
        assert!(
            std::ptr::eq(self.graph, rhs.graph),
            "cannot combine terms of different graphs"
        );
        self.with(NodeKind::Binary(op, self.id, rhs.id))
    }

    fn with(self, kind: NodeKind) -> Self {
        Self {
            graph: self.graph,
            id: self.graph.push(kind),
        }
    }
}

impl fmt::Debug for Term<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term")
            .field("id", &self.id)
            .field("kind", &self.graph.kind(self.id))
            .field("value", &self.value())
            .field("grad", &self.grad())
            .finish()
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<'a> $trait for Term<'a> {
            type Output = Term<'a>;
            fn $method(self, rhs: Self) -> Self::Output {
                self.binary($op, rhs)
            }
        }

        impl<'a> $trait<f64> for Term<'a> {
            type Output = Term<'a>;
            fn $method(self, rhs: f64) -> Self::Output {
                self.binary($op, self.graph.constant(rhs))
            }
        }

        impl<'a> $trait<Term<'a>> for f64 {
            type Output = Term<'a>;
            fn $method(self, rhs: Term<'a>) -> Self::Output {
                rhs.graph.constant(self).binary($op, rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

impl<'a> Neg for Term<'a> {
    type Output = Term<'a>;
    fn neg(self) -> Self::Output {
        self.unary(UnaryOp::Neg)
    }
}
