use std::fmt::{self, Display};

/// A single-operand operator kind.
///
/// Each variant knows how to transform its operand value and how to compute
/// the local derivative with respect to that operand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UnaryOp {
    Neg,
    Exp,
    Ln,
    Sin,
    Cos,
    Tanh,
    Sigmoid,
    Custom(CustomFn),
}

impl UnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Neg => "Neg",
            Self::Exp => "Exp",
            Self::Ln => "Ln",
            Self::Sin => "Sin",
            Self::Cos => "Cos",
            Self::Tanh => "Tanh",
            Self::Sigmoid => "Sigmoid",
            Self::Custom(custom) => custom.name,
        }
    }

    pub fn f(&self, x: f64) -> f64 {
        match self {
            Self::Neg => -x,
            Self::Exp => x.exp(),
            Self::Ln => x.ln(),
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tanh => x.tanh(),
            Self::Sigmoid => sigmoid(x),
            Self::Custom(custom) => (custom.f)(x),
        }
    }

    /// Derivative of `f` evaluated at the operand value `x`.
    pub fn grad(&self, x: f64) -> f64 {
        match self {
            Self::Neg => -1.,
            Self::Exp => x.exp(),
            Self::Ln => x.recip(),
            Self::Sin => x.cos(),
            Self::Cos => -x.sin(),
            Self::Tanh => {
                let t = x.tanh();
                1. - t * t
            }
            Self::Sigmoid => {
                let s = sigmoid(x);
                s * (1. - s)
            }
            Self::Custom(custom) => (custom.grad)(x),
        }
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn sigmoid(x: f64) -> f64 {
    1. / (1. + (-x).exp())
}

/// A user supplied unary function, given as a pair of function pointers for
/// the value and its derivative.
#[derive(Clone, Copy, Debug)]
pub struct CustomFn {
    pub name: &'static str,
    pub f: fn(f64) -> f64,
    pub grad: fn(f64) -> f64,
}

// Function pointer addresses are not stable across codegen units, so custom
// functions are identified by name.
impl PartialEq for CustomFn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
