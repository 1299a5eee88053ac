//! Read-only rendering of an evaluated graph: node and edge labels, and a
//! writer for Graphviz dot files.

use std::io::Write;

use crate::{
    error::{GraphError, Result},
    graph::{check_id, reachable, write_expr, Graph, NodeId},
};

const DEFAULT_PRECISION: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct NodeLabel {
    pub id: NodeId,
    pub kind: String,
    pub value: String,
    pub grad: String,
}

/// An operator to operand edge, labelled with the cached local derivative.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeLabel {
    pub from: NodeId,
    pub to: NodeId,
    pub local_grad: String,
}

impl Graph {
    /// Labels of every node reachable from `root`, in ascending id order.
    /// Values print as `?` until they are computed.
    pub fn node_labels(&self, root: NodeId) -> Result<Vec<NodeLabel>> {
        self.node_labels_with(root, DEFAULT_PRECISION)
    }

    pub fn edge_labels(&self, root: NodeId) -> Result<Vec<EdgeLabel>> {
        self.edge_labels_with(root, DEFAULT_PRECISION)
    }

    pub fn dot_builder(&self, root: NodeId) -> DotBuilder<'_> {
        DotBuilder {
            graph: self,
            root,
            show_values: true,
            show_expr: false,
            precision: DEFAULT_PRECISION,
            rankdir: "RL",
            highlights: None,
        }
    }

    fn node_labels_with(&self, root: NodeId, precision: usize) -> Result<Vec<NodeLabel>> {
        let nodes = self.nodes.borrow();
        check_id(&nodes, root)?;
        Ok(reachable(&nodes, root)
            .into_iter()
            .map(|id| {
                let node = &nodes[id.index()];
                NodeLabel {
                    id,
                    kind: node.kind.label(),
                    value: format_num(node.data, precision),
                    grad: format_num(node.grad, precision),
                }
            })
            .collect())
    }

    fn edge_labels_with(&self, root: NodeId, precision: usize) -> Result<Vec<EdgeLabel>> {
        let nodes = self.nodes.borrow();
        check_id(&nodes, root)?;
        let mut edges = vec![];
        for from in reachable(&nodes, root) {
            let node = &nodes[from.index()];
            for (i, to) in node.kind.operands().into_iter().enumerate() {
                let local = node.local_grads.get(i).copied();
                edges.push(EdgeLabel {
                    from,
                    to,
                    local_grad: format!("∂{from}/∂{to}: {}", format_num(local, precision)),
                });
            }
        }
        Ok(edges)
    }
}

fn format_num(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(value) => format!("{value:.precision$}"),
        None => "?".to_string(),
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

pub struct DotBuilder<'a> {
    graph: &'a Graph,
    root: NodeId,
    show_values: bool,
    show_expr: bool,
    precision: usize,
    rankdir: &'static str,
    highlights: Option<NodeId>,
}

impl<'a> DotBuilder<'a> {
    /// Show forward values, gradients and local derivatives. On by default.
    pub fn show_values(mut self, v: bool) -> Self {
        self.show_values = v;
        self
    }

    /// Show the expression each node computes in terms of its operands.
    /// Leaf operands are written inline and operator operands by id, e.g.
    /// `exp(w6)`.
    pub fn show_expr(mut self, v: bool) -> Self {
        self.show_expr = v;
        self
    }

    pub fn precision(mut self, v: usize) -> Self {
        self.precision = v;
        self
    }

    /// Graphviz `rankdir`. Defaults to `"RL"`, which puts the root on the left.
    pub fn rankdir(mut self, v: &'static str) -> Self {
        self.rankdir = v;
        self
    }

    pub fn highlights(mut self, id: NodeId) -> Self {
        self.highlights = Some(id);
        self
    }

    /// Write graphviz dot file to the given writer.
    pub fn dot(&self, writer: &mut impl Write) -> std::io::Result<()> {
        let to_io = |e: GraphError| std::io::Error::new(std::io::ErrorKind::InvalidInput, e);
        let nodes = self
            .graph
            .node_labels_with(self.root, self.precision)
            .map_err(to_io)?;
        let edges = self
            .graph
            .edge_labels_with(self.root, self.precision)
            .map_err(to_io)?;

        let graph_nodes = self.graph.nodes.borrow();

        writeln!(writer, "digraph G {{\nrankdir=\"{}\";", self.rankdir)?;
        writeln!(writer, "node [shape=box, style=rounded];")?;
        for node in &nodes {
            let mut label = format!("{}\\n{}", node.id, escape(&node.kind));
            if self.show_expr {
                let mut expr = String::new();
                write_expr(
                    &graph_nodes,
                    node.id,
                    |n| !graph_nodes[n.index()].kind.is_leaf(),
                    &mut expr,
                );
                label += &format!("\\n{}", escape(&expr));
            }
            if self.show_values {
                label += &format!("\\nfwd: {}\\nadj: {}", node.value, node.grad);
            }
            let style = if Some(node.id) == self.highlights {
                ", style=\"rounded,filled\", fillcolor=\"#ffff7f\""
            } else {
                ""
            };
            writeln!(writer, "{} [label=\"{label}\"{style}];", node.id)?;
        }
        for edge in &edges {
            if self.show_values {
                writeln!(
                    writer,
                    "{} -> {} [label=\"{}\"];",
                    edge.from, edge.to, edge.local_grad
                )?;
            } else {
                writeln!(writer, "{} -> {};", edge.from, edge.to)?;
            }
        }
        writeln!(writer, "}}")?;
        Ok(())
    }
}
