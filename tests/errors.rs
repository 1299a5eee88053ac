use std::collections::HashMap;

use dagrad::{BinaryOp, Graph, GraphError, OpKind, UnaryOp};

#[test]
fn unbound_variable() {
    let graph = Graph::new();
    let x = graph.make_variable("x");
    let env: HashMap<String, f64> = HashMap::new();

    let err = graph.forward(x, &env).unwrap_err();
    assert!(
        matches!(&err, GraphError::UnboundVariable { name, node } if name == "x" && *node == x),
        "{err:?}"
    );
    assert_eq!(
        err.to_string(),
        "Variable \"x\" (w1) is not bound in the environment"
    );
    assert_eq!(graph.value(x), None);
}

#[test]
fn failed_forward_keeps_previous_state() {
    let graph = Graph::new();
    let x = graph.make_variable("x");
    let y = graph.make_variable("y");
    let z = graph.mul(x, y).unwrap();
    graph.forward(z, &[("x", 2.), ("y", 3.)]).unwrap();
    graph.backward(z, 1.).unwrap();

    let err = graph.forward(z, &[("x", 10.)]).unwrap_err();
    assert!(matches!(err, GraphError::UnboundVariable { node, .. } if node == y));

    assert_eq!(graph.value(x), Some(2.));
    assert_eq!(graph.value(z), Some(6.));
    assert_eq!(graph.grad(x), Some(3.));
    assert_eq!(graph.local_grads(z), vec![3., 2.]);
    // The graph is still consistent with the last successful pass.
    graph.backward(z, 1.).unwrap();
    assert_eq!(graph.grad(x), Some(6.));
}

#[test]
fn arity() {
    let graph = Graph::new();
    let a = graph.make_constant(1.);
    let b = graph.make_constant(2.);

    let err = graph.combine(BinaryOp::Add, &[a]).unwrap_err();
    assert!(matches!(
        err,
        GraphError::Arity {
            op: OpKind::Binary(BinaryOp::Add),
            expected: 2,
            actual: 1,
        }
    ));
    assert_eq!(err.to_string(), "Add takes 2 operand(s), but 1 were given");

    let err = graph.combine(UnaryOp::Exp, &[a, b]).unwrap_err();
    assert!(matches!(
        err,
        GraphError::Arity {
            expected: 1,
            actual: 2,
            ..
        }
    ));
    assert!(graph.combine(OpKind::Unary(UnaryOp::Sin), &[]).is_err());

    assert_eq!(graph.len(), 2);
    assert!(graph.parents(a).is_empty());
    assert!(graph.parents(b).is_empty());
}

#[test]
fn unknown_node() {
    let big = Graph::new();
    big.make_constant(1.);
    big.make_constant(2.);
    let foreign = big.make_constant(3.);

    let graph = Graph::new();
    let a = graph.make_constant(1.);
    let err = graph.mul(a, foreign).unwrap_err();
    assert!(matches!(err, GraphError::UnknownNode { node, len: 1 } if node == foreign));
    assert_eq!(graph.len(), 1);
    assert!(graph.parents(a).is_empty());

    assert!(matches!(
        graph.forward(foreign, &[("x", 1.)]),
        Err(GraphError::UnknownNode { .. })
    ));
    assert!(matches!(
        graph.backward(foreign, 1.),
        Err(GraphError::UnknownNode { .. })
    ));
    assert!(graph.term(foreign).is_none());
}

#[test]
fn backward_before_forward() {
    let graph = Graph::new();
    let x = graph.make_variable("x");
    let z = graph.exp(x).unwrap();

    let err = graph.backward(z, 1.).unwrap_err();
    assert!(matches!(err, GraphError::NotEvaluated { node } if node == z));
    assert_eq!(graph.grad(x), None);
}

#[test]
fn backward_from_unevaluated_root() {
    let graph = Graph::new();
    let x = graph.make_variable("x");
    let y = graph.exp(x).unwrap();
    let z = graph.mul(y, x).unwrap();

    graph.forward(y, &[("x", 0.)]).unwrap();
    let err = graph.backward(z, 1.).unwrap_err();
    assert!(matches!(err, GraphError::NotEvaluated { node } if node == z));
}

#[test]
fn backward_after_partial_reevaluation() {
    let graph = Graph::new();
    let x = graph.make_variable("x");
    let y = graph.exp(x).unwrap();
    let z = graph.mul(y, x).unwrap();

    graph.forward(z, &[("x", 0.)]).unwrap();
    // `y` and `x` now hold values of a different pass than `z`.
    graph.forward(y, &[("x", 1.)]).unwrap();
    let err = graph.backward(z, 1.).unwrap_err();
    assert!(matches!(err, GraphError::NotEvaluated { node } if node == x));
    assert_eq!(graph.grad(z), None);
}

#[test]
#[should_panic(expected = "different graphs")]
fn mixing_graphs_panics() {
    let g1 = Graph::new();
    let g2 = Graph::new();
    let _ = g1.variable("x") + g2.variable("y");
}
