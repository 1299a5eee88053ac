use std::fmt::{self, Display};

/// A two-operand operator kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
        }
    }

    /// Infix symbol used when printing expressions.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    pub fn f(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
        }
    }

    /// Local derivatives with respect to `(lhs, rhs)`, evaluated at the
    /// given operand values.
    pub fn grad(&self, lhs: f64, rhs: f64) -> (f64, f64) {
        match self {
            Self::Add => (1., 1.),
            Self::Sub => (1., -1.),
            Self::Mul => (rhs, lhs),
            Self::Div => (rhs.recip(), -lhs / (rhs * rhs)),
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
