//! Nodes used by several operators must receive the sum of all contributions.

use std::collections::HashMap;

use dagrad::{Graph, NodeId};

#[test]
fn square_uses_both_slots() {
    let graph = Graph::new();
    let x = graph.make_variable("x");
    let z = graph.mul(x, x).unwrap();

    assert_eq!(graph.forward(z, &[("x", 3.)]).unwrap(), 9.);
    graph.backward(z, 1.).unwrap();

    assert_eq!(graph.grad(x), Some(6.));
    assert_eq!(graph.grad(z), Some(1.));
    assert_eq!(graph.parents(x), vec![z, z]);
}

#[test]
fn fan_out() {
    let graph = Graph::new();
    let a = graph.make_variable("a");
    let y = graph.add(a, a).unwrap();
    let z = graph.mul(y, a).unwrap();

    assert_eq!(graph.forward(z, &[("a", 2.)]).unwrap(), 8.);
    graph.backward(z, 1.).unwrap();

    assert_eq!(graph.grad(a), Some(8.));
    assert_eq!(graph.grad(y), Some(2.));
    assert_eq!(graph.parents(a), vec![y, y, z]);
}

/// Dependency graph in diamond shape. It evaluates the same term twice, so
/// the derivative should add up.
#[test]
fn diamond() {
    let graph = Graph::new();
    let a = graph.variable("a");
    let b = graph.variable("b");
    let c = graph.variable("c");
    let ab = a + b;
    let ac = a + c;
    let abac = ab + ac;

    abac.forward(&[("a", 1.), ("b", 3.), ("c", 5.)]).unwrap();
    abac.backprop().unwrap();
    assert_eq!(a.grad(), Some(2.));
    assert_eq!(b.grad(), Some(1.));
    assert_eq!(c.grad(), Some(1.));
}

#[test]
fn adjoint_is_final_when_reported() {
    let graph = Graph::new();
    let a = graph.make_variable("a");
    let y = graph.add(a, a).unwrap();
    let z = graph.mul(y, a).unwrap();
    graph.forward(z, &[("a", 2.)]).unwrap();

    let mut reported: Vec<(NodeId, f64)> = vec![];
    graph
        .backward_cb(z, 1., |id, adjoint| reported.push((id, adjoint)))
        .unwrap();

    assert_eq!(reported, vec![(z, 1.), (y, 2.), (a, 8.)]);
    for (i, (id, adjoint)) in reported.iter().enumerate() {
        assert_eq!(graph.grad(*id), Some(*adjoint));
        // Every consumer was reported before the node itself.
        for parent in graph.parents(*id) {
            let pos = reported.iter().position(|(p, _)| *p == parent).unwrap();
            assert!(pos < i);
        }
    }
}

#[test]
fn unreachable_parents_do_not_contribute() {
    let graph = Graph::new();
    let a = graph.make_variable("a");
    let b = graph.make_variable("b");
    let ab = graph.mul(a, b).unwrap();
    let other = graph.mul(a, a).unwrap();

    graph.forward(ab, &[("a", 2.), ("b", 5.)]).unwrap();
    graph.backward(ab, 1.).unwrap();

    assert_eq!(graph.grad(a), Some(5.));
    assert_eq!(graph.grad(b), Some(2.));
    assert_eq!(graph.value(other), None);
    assert_eq!(graph.grad(other), None);
}

#[test]
fn repeated_backward_accumulates() {
    let graph = Graph::new();
    let x = graph.make_variable("x");
    let z = graph.mul(x, x).unwrap();
    graph.forward(z, &[("x", 3.)]).unwrap();

    graph.backward(z, 1.).unwrap();
    graph.backward(z, 0.5).unwrap();
    assert_eq!(graph.grad(x), Some(9.));

    graph.clear_grad(z).unwrap();
    assert_eq!(graph.grad(x), None);

    graph.backprop(z).unwrap();
    assert_eq!(graph.grad(x), Some(6.));
}

#[test]
fn seed_scales_every_gradient() {
    let graph = Graph::new();
    let x = graph.variable("x");
    let y = graph.variable("y");
    let z = x * y + x;
    z.forward(&[("x", 2.), ("y", 3.)]).unwrap();
    z.backward(-2.).unwrap();
    assert_eq!(x.grad(), Some(-8.));
    assert_eq!(y.grad(), Some(-4.));
}

#[test]
fn independent_evaluations() {
    let build = |graph: &Graph| {
        let x = graph.make_variable("x");
        let y = graph.make_variable("y");
        let xy = graph.mul(x, y).unwrap();
        let z = graph.add(xy, x).unwrap();
        (x, y, z)
    };

    let reused = Graph::new();
    let (x, y, z) = build(&reused);
    reused.forward(z, &[("x", 1.), ("y", 2.)]).unwrap();
    reused.backward(z, 1.).unwrap();
    assert_eq!(reused.grad(x), Some(3.));

    let mut env = HashMap::new();
    env.insert("x", -4.);
    env.insert("y", 0.5);
    let value = reused.forward(z, &env).unwrap();
    // Gradients of the first run are discarded by the new forward pass.
    assert_eq!(reused.grad(x), None);
    reused.backward(z, 1.).unwrap();

    let fresh = Graph::new();
    let (fx, fy, fz) = build(&fresh);
    assert_eq!(fresh.forward(fz, &env).unwrap(), value);
    fresh.backward(fz, 1.).unwrap();

    assert_eq!(reused.grad(x), fresh.grad(fx));
    assert_eq!(reused.grad(y), fresh.grad(fy));
    assert_eq!(reused.grad(x), Some(1.5));
    assert_eq!(reused.grad(y), Some(-4.));
}

#[test]
fn separate_graphs_on_separate_threads() {
    let handles: Vec<_> = (1..=4)
        .map(|i| {
            std::thread::spawn(move || {
                let graph = Graph::new();
                let x = graph.variable("x");
                let z = x * x * x;
                z.forward(&[("x", i as f64)]).unwrap();
                z.backprop().unwrap();
                x.grad()
            })
        })
        .collect();

    for (i, handle) in (1..=4).zip(handles) {
        let i = i as f64;
        assert_eq!(handle.join().unwrap(), Some(3. * i * i));
    }
}
