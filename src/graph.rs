//! Read-only view of a task and everything upstream of it.
//!
//! Tasks reference their inputs directly, so the graph they form exists
//! implicitly. [`TaskGraph`] materializes it into a [`petgraph`] graph, which
//! is handy for inspecting what a piece of authoring code actually built:
//!
//! ```rust
//! use kumiki::as_task;
//!
//! let shared = as_task(1).unwrap();
//! let task = as_task((&shared, vec![&shared])).unwrap();
//!
//! let graph = task.graph();
//! assert_eq!(graph.node_count(), 3);
//! println!("{graph}");
//! ```

use std::collections::HashMap;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::task::{Binding, Task, TaskId};

/// A task together with all of its upstream tasks, each appearing once.
///
/// Edges point from the upstream task to the task consuming it, labelled
/// with the binding the output is passed through.
pub struct TaskGraph {
    graph: Graph<Task, Binding>,
    root: NodeIndex,
}

impl TaskGraph {
    pub(crate) fn new(root: &Task) -> Self {
        let mut graph = Graph::new();
        let mut seen = HashMap::new();
        let root = visit(&mut graph, &mut seen, root);

        Self { graph, root }
    }

    /// The task the graph was built from.
    pub fn root(&self) -> &Task {
        &self.graph[self.root]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, task: &Task) -> bool {
        self.graph.node_weights().any(|node| node == task)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_weights()
    }

    /// The underlying graph.
    pub fn inner(&self) -> &Graph<Task, Binding> {
        &self.graph
    }
}

fn visit(
    graph: &mut Graph<Task, Binding>,
    seen: &mut HashMap<TaskId, NodeIndex>,
    task: &Task,
) -> NodeIndex {
    if let Some(&index) = seen.get(&task.id()) {
        return index;
    }

    let index = graph.add_node(task.clone());
    seen.insert(task.id(), index);

    for input in task.inputs() {
        let upstream = visit(graph, seen, &input.task);
        graph.add_edge(upstream, index, input.binding.clone());
    }

    index
}

impl Task {
    /// Collects this task and everything upstream of it.
    pub fn graph(&self) -> TaskGraph {
        TaskGraph::new(self)
    }
}

impl std::fmt::Display for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for index in self.graph.node_indices() {
            let task = &self.graph[index];
            let name = escape(task.name());

            match task.group() {
                Some(group) => writeln!(
                    f,
                    "    {}[\"{}<br/><small>{}</small>\"]",
                    index.index(),
                    name,
                    escape(group)
                )?,
                None => writeln!(f, "    {}[\"{}\"]", index.index(), name)?,
            }
        }

        for edge in self.graph.edge_indices() {
            let Some((source, target)) = self.graph.edge_endpoints(edge) else {
                continue;
            };

            let label = match &self.graph[edge] {
                Binding::Position(index) => format!("#{index}"),
                Binding::Keyword(name) => name.clone(),
            };

            writeln!(
                f,
                "    {} -- \"{}\" --> {}",
                source.index(),
                label,
                target.index()
            )?;
        }

        Ok(())
    }
}

/// Escapes text for use inside a quoted Mermaid label.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '"' => out.push_str("#quot;"),
            '<' => out.push_str("#lt;"),
            '>' => out.push_str("#gt;"),
            '\n' => out.push_str("<br/>"),
            '\r' => {}
            c => out.push(c),
        }
    }

    out
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("root", &self.root().id())
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::as_task;
    use crate::scope::group;

    #[test]
    fn test_single_node() {
        let task = as_task(1).unwrap();
        let graph = task.graph();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.root().ptr_eq(&task));
    }

    #[test]
    fn test_diamond_deduplicated() {
        let shared = as_task("shared").unwrap();
        let left = as_task(vec![&shared]).unwrap();
        let right = as_task((&shared,)).unwrap();
        let top = as_task(vec![&left, &right]).unwrap();

        let graph = top.graph();

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.contains(&shared));
        assert!(!graph.contains(&as_task(1).unwrap()));
    }

    #[test]
    fn test_edges_point_downstream() {
        let leaf = as_task(1).unwrap();
        let root = as_task(vec![&leaf]).unwrap();
        let graph = root.graph();
        let inner = graph.inner();

        let edge = inner.edge_indices().next().unwrap();
        let (source, target) = inner.edge_endpoints(edge).unwrap();

        assert!(inner[source].ptr_eq(&leaf));
        assert!(inner[target].ptr_eq(&root));
        assert_eq!(inner[edge], Binding::Position(0));
    }

    #[test]
    fn test_mermaid() {
        let _g = group("math");
        let task = as_task(std::collections::BTreeMap::from([("x", "quoted")])).unwrap();

        let rendered = task.graph().to_string();

        assert!(rendered.starts_with("graph LR\n"));
        assert!(rendered.contains("0[\"Dict<br/><small>math</small>\"]"));
        assert!(rendered.contains("1[\"#quot;quoted#quot;<br/><small>math</small>\"]"));
        assert!(rendered.contains("1 -- \"x\" --> 0"));
    }

    #[test]
    fn test_mermaid_escapes_labels() {
        struct Markup;

        impl std::fmt::Debug for Markup {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "<p>\r\n\"hi\"</p>")
            }
        }

        let task = as_task(crate::value::Value::constant(Markup)).unwrap();
        let rendered = task.graph().to_string();

        assert_eq!(rendered.lines().count(), 2);
        assert!(rendered.contains("0[\"#lt;p#gt;<br/>#quot;hi#quot;#lt;/p#gt;\"]"));
    }
}
