//! Forward and backward passes over a [`Graph`].
//!
//! Both passes compute into scratch buffers and write the nodes in a single
//! commit at the end, so a pass that fails leaves the graph as it was, and
//! nobody can observe a half-accumulated gradient.

use log::{debug, trace};

use crate::{
    error::{GraphError, Result},
    graph::{check_id, reachable, Graph, NodeId, NodeKind},
    Environment,
};

impl Graph {
    /// Evaluate every node reachable from `root` and cache the local
    /// derivatives of each operator with respect to its operands.
    ///
    /// Gradients of the evaluated nodes are reset, since they belong to the
    /// previous values. If a variable is missing from `env`, nothing is
    /// written and the previous state of the graph stays intact.
    pub fn forward<E: Environment + ?Sized>(&self, root: NodeId, env: &E) -> Result<f64> {
        let (order, results, values) = {
            let nodes = self.nodes.borrow();
            check_id(&nodes, root)?;
            let order = reachable(&nodes, root);
            debug!("forward from {root}: {} nodes", order.len());

            // Indexed by id; operands are always written before they are read.
            let mut values = vec![0.; root.index() + 1];
            let mut results = Vec::with_capacity(order.len());
            for &id in &order {
                let (data, local_grads) = match &nodes[id.index()].kind {
                    NodeKind::Constant(value) => (*value, vec![]),
                    NodeKind::Variable(name) => {
                        let value = env.lookup(name).ok_or_else(|| {
                            GraphError::UnboundVariable {
                                name: name.clone(),
                                node: id,
                            }
                        })?;
                        (value, vec![])
                    }
                    NodeKind::Unary(op, operand) => {
                        let x = values[operand.index()];
                        (op.f(x), vec![op.grad(x)])
                    }
                    NodeKind::Binary(op, lhs, rhs) => {
                        let (l, r) = (values[lhs.index()], values[rhs.index()]);
                        let (dlhs, drhs) = op.grad(l, r);
                        (op.f(l, r), vec![dlhs, drhs])
                    }
                };
                trace!("forward {id}: {data} {local_grads:?}");
                values[id.index()] = data;
                results.push(local_grads);
            }
            (order, results, values)
        };

        let value = values[root.index()];
        let pass = self.passes.get() + 1;
        self.passes.set(pass);
        let mut nodes = self.nodes.borrow_mut();
        for (id, local_grads) in order.into_iter().zip(results) {
            let node = &mut nodes[id.index()];
            node.data = Some(values[id.index()]);
            node.local_grads = local_grads;
            node.grad = None;
            node.pass = Some(pass);
        }
        debug!("forward from {root} done: {value}");
        Ok(value)
    }

    /// Propagate `seed` from `root` down to every reachable node and add the
    /// resulting adjoints to their gradients.
    ///
    /// Nodes are visited in descending id order. Every consumer of a node has
    /// a larger id, so a node's adjoint is complete by the time it is visited.
    /// Gradients are written only when the whole pass has finished.
    ///
    /// Fails with [`GraphError::NotEvaluated`] unless every reachable node was
    /// evaluated by the same forward pass as `root`.
    pub fn backward(&self, root: NodeId, seed: f64) -> Result<()> {
        self.backward_cb(root, seed, |_, _| ())
    }

    /// Same as [`Graph::backward`], calling `callback(id, adjoint)` for each
    /// node once its adjoint is final.
    ///
    /// The callback may read the graph, but gradients are not committed yet
    /// while it runs. It must not run another pass on this graph.
    pub fn backward_cb(
        &self,
        root: NodeId,
        seed: f64,
        mut callback: impl FnMut(NodeId, f64),
    ) -> Result<()> {
        let (order, edges) = {
            let nodes = self.nodes.borrow();
            check_id(&nodes, root)?;
            let pass = nodes[root.index()]
                .pass
                .ok_or(GraphError::NotEvaluated { node: root })?;
            let order = reachable(&nodes, root);
            let mut edges = Vec::with_capacity(order.len());
            for &id in &order {
                let node = &nodes[id.index()];
                if node.pass != Some(pass) {
                    return Err(GraphError::NotEvaluated { node: id });
                }
                let node_edges: Vec<(NodeId, f64)> = node
                    .kind
                    .operands()
                    .into_iter()
                    .zip(node.local_grads.iter().copied())
                    .collect();
                edges.push(node_edges);
            }
            (order, edges)
        };
        debug!("backward from {root}: {} nodes, seed {seed}", order.len());

        let mut adjoints = vec![0.; root.index() + 1];
        adjoints[root.index()] = seed;
        for (&id, node_edges) in order.iter().zip(&edges).rev() {
            let adjoint = adjoints[id.index()];
            trace!("backward {id}: {adjoint}");
            callback(id, adjoint);
            for &(operand, local_grad) in node_edges {
                adjoints[operand.index()] += adjoint * local_grad;
            }
        }

        let mut nodes = self.nodes.borrow_mut();
        for id in order {
            let node = &mut nodes[id.index()];
            node.grad = Some(node.grad.unwrap_or(0.) + adjoints[id.index()]);
        }
        Ok(())
    }

    /// Reset the gradient of every node reachable from `root`.
    pub fn clear_grad(&self, root: NodeId) -> Result<()> {
        let mut nodes = self.nodes.borrow_mut();
        check_id(&nodes, root)?;
        for id in reachable(&nodes, root) {
            nodes[id.index()].grad = None;
        }
        Ok(())
    }

    /// The entry point to backpropagation: clear the gradients and run a
    /// backward pass seeded with 1.
    pub fn backprop(&self, root: NodeId) -> Result<()> {
        self.clear_grad(root)?;
        self.backward(root, 1.)
    }
}
