//! Graph export to DOT and external rendering.
//!
//! # Responsibility
//! - Turn a [`RichGraph`] into a renderer-neutral node/edge list with style
//!   hints.
//! - Render that list as Graphviz DOT, or as SVG through the `dot` binary.
//!
//! # Invariants
//! - Labels never contain raw newlines and are length-capped.
//! - Rendering never touches the database.

use crate::graph::{EdgeKind, MaxDistance, RichGraph};
use crate::service::journal::{Journal, JournalResult};
use log::{error, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter, Write as _};
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process::{Command, Stdio};

const MAX_LABEL_CHARS: usize = 40;
const START_NODE_FILL: &str = "#ffd966";
const NODE_FILLS_BY_DEPTH: &[&str] = &["#cfe2f3", "#d9ead3", "#ead1dc", "#eeeeee"];

/// Errors from graph renderers.
#[derive(Debug)]
pub enum RenderError {
    /// Renderer process could not be started.
    Spawn { program: String, source: std::io::Error },
    /// Piping input to or reading output from the renderer failed.
    Io(std::io::Error),
    /// Renderer exited unsuccessfully.
    Failed { status: String, stderr: String },
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { program, source } => {
                write!(f, "failed to start graph renderer `{program}`: {source}")
            }
            Self::Io(err) => write!(f, "graph renderer io failed: {err}"),
            Self::Failed { status, stderr } => {
                write!(f, "graph renderer failed ({status}): {stderr}")
            }
        }
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            Self::Failed { .. } => None,
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderNode {
    pub id: String,
    pub label: String,
    /// Renderer attributes such as `fillcolor` or `style`.
    pub style: BTreeMap<&'static str, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub style: BTreeMap<&'static str, String>,
}

/// Renderer-neutral graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderGraph {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
}

impl RenderGraph {
    /// Builds style-annotated nodes/edges from a traversal result.
    pub fn from_rich_graph(graph: &RichGraph) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|node| {
                let is_start = graph.start_ids.iter().any(|id| *id == node.block.id);
                let fill = if is_start {
                    START_NODE_FILL
                } else {
                    let index = (node.depth as usize)
                        .saturating_sub(1)
                        .min(NODE_FILLS_BY_DEPTH.len() - 1);
                    NODE_FILLS_BY_DEPTH[index]
                };

                let mut style = BTreeMap::new();
                style.insert("fillcolor", fill.to_string());
                style.insert(
                    "style",
                    if is_start { "filled,bold" } else { "filled" }.to_string(),
                );
                style.insert(
                    "tooltip",
                    format!(
                        "{} | children={} refs={} backlinks={}",
                        node.block.kind,
                        node.child_count,
                        node.reference_count,
                        node.backlink_count
                    ),
                );

                RenderNode {
                    id: node.block.id.clone(),
                    label: node_label(&node.block.content, &node.block.id),
                    style,
                }
            })
            .collect();

        let edges = graph
            .edges
            .iter()
            .map(|edge| {
                let mut style = BTreeMap::new();
                match edge.kind {
                    EdgeKind::Link => {
                        style.insert("color", "#333333".to_string());
                    }
                    EdgeKind::Reference => {
                        style.insert("color", "#888888".to_string());
                        style.insert("style", "dashed".to_string());
                    }
                }
                RenderEdge {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    kind: edge.kind,
                    style,
                }
            })
            .collect();

        Self { nodes, edges }
    }
}

/// Renders node/edge lists to a serialized image or document.
pub trait GraphRenderer {
    fn render(&self, graph: &RenderGraph) -> Result<String, RenderError>;
}

/// Emits Graphviz DOT source.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotRenderer;

impl GraphRenderer for DotRenderer {
    fn render(&self, graph: &RenderGraph) -> Result<String, RenderError> {
        Ok(to_dot(graph))
    }
}

/// Pipes DOT into an external Graphviz binary.
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    /// Graphviz executable, `dot` by default.
    pub program: PathBuf,
    /// Output format passed as `-T<format>`.
    pub format: String,
}

impl Default for GraphvizRenderer {
    fn default() -> Self {
        Self {
            program: PathBuf::from("dot"),
            format: "svg".to_string(),
        }
    }
}

impl GraphRenderer for GraphvizRenderer {
    fn render(&self, graph: &RenderGraph) -> Result<String, RenderError> {
        let dot = to_dot(graph);
        let mut child = Command::new(&self.program)
            .arg(format!("-T{}", self.format))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // stdin is fed from a second thread while stdout/stderr are drained.
        let stdin = child.stdin.take();
        let (output, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(|| match stdin {
                Some(mut stdin) => stdin.write_all(dot.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            (output, written)
        });
        let output = output?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(
                "event=graph_render module=graph status=error renderer=graphviz exit={}",
                output.status
            );
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        // A clean exit with unread input still counts as a failed write.
        written?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Serializes a render graph as a DOT digraph.
pub fn to_dot(graph: &RenderGraph) -> String {
    let mut out = String::from("digraph journal {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, fontname=\"Helvetica\"];\n");

    for node in &graph.nodes {
        let _ = write!(
            out,
            "  \"{}\" [label=\"{}\"",
            escape_dot(&node.id),
            escape_dot(&node.label)
        );
        write_attributes(&mut out, &node.style);
        out.push_str("];\n");
    }

    for edge in &graph.edges {
        let _ = write!(
            out,
            "  \"{}\" -> \"{}\" [",
            escape_dot(&edge.source),
            escape_dot(&edge.target)
        );
        let _ = write!(
            out,
            "class=\"{}\"",
            match edge.kind {
                EdgeKind::Link => "link",
                EdgeKind::Reference => "reference",
            }
        );
        write_attributes(&mut out, &edge.style);
        out.push_str("];\n");
    }

    out.push_str("}\n");
    out
}

fn write_attributes(out: &mut String, attributes: &BTreeMap<&'static str, String>) {
    for (key, value) in attributes {
        let _ = write!(out, ", {key}=\"{}\"", escape_dot(value));
    }
}

fn escape_dot(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn node_label(content: &str, id: &str) -> String {
    let flattened = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.is_empty() {
        return id.to_string();
    }
    let mut label = flattened.chars().take(MAX_LABEL_CHARS).collect::<String>();
    if flattened.chars().count() > MAX_LABEL_CHARS {
        label.push_str("...");
    }
    label
}

impl Journal<'_> {
    /// Renders the rich graph around `start_ids` through `renderer`.
    pub fn get_graph_svg<I, S>(
        &self,
        start_ids: I,
        max_distance: MaxDistance,
        include_references: bool,
        renderer: &dyn GraphRenderer,
    ) -> JournalResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let graph = self.get_rich_graph(start_ids, max_distance, include_references)?;
        let render_graph = RenderGraph::from_rich_graph(&graph);
        let rendered = renderer.render(&render_graph)?;
        info!(
            "event=graph_render module=graph status=ok nodes={} edges={} bytes={}",
            render_graph.nodes.len(),
            render_graph.edges.len(),
            rendered.len()
        );
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        escape_dot, node_label, to_dot, GraphRenderer, GraphvizRenderer, RenderEdge, RenderError,
        RenderGraph, RenderNode,
    };
    use crate::graph::EdgeKind;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn labels_flatten_whitespace_and_truncate() {
        assert_eq!(node_label("line one\nline two", "id"), "line one line two");
        assert_eq!(node_label("   ", "fallback-id"), "fallback-id");
        let long = "x".repeat(60);
        let label = node_label(&long, "id");
        assert!(label.ends_with("..."));
        assert_eq!(label.chars().count(), 43);
    }

    #[test]
    fn dot_escapes_quotes_and_marks_reference_edges() {
        let mut edge_style = BTreeMap::new();
        edge_style.insert("style", "dashed".to_string());
        let graph = RenderGraph {
            nodes: vec![
                RenderNode {
                    id: "a".to_string(),
                    label: "say \"hi\"".to_string(),
                    style: BTreeMap::new(),
                },
                RenderNode {
                    id: "b".to_string(),
                    label: "b".to_string(),
                    style: BTreeMap::new(),
                },
            ],
            edges: vec![RenderEdge {
                source: "a".to_string(),
                target: "b".to_string(),
                kind: EdgeKind::Reference,
                style: edge_style,
            }],
        };

        let dot = to_dot(&graph);
        assert!(dot.starts_with("digraph journal {"));
        assert!(dot.contains(r#""a" [label="say \"hi\""];"#));
        assert!(dot.contains(r#""a" -> "b" [class="reference", style="dashed"];"#));
    }

    #[test]
    fn backslashes_are_escaped_first() {
        assert_eq!(escape_dot(r#"a\"b"#), r#"a\\\"b"#);
    }

    fn wide_graph(count: usize) -> RenderGraph {
        RenderGraph {
            nodes: (0..count)
                .map(|i| RenderNode {
                    id: format!("block-{i:05}"),
                    label: format!("label for block number {i}"),
                    style: BTreeMap::new(),
                })
                .collect(),
            edges: Vec::new(),
        }
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let renderer = GraphvizRenderer {
            program: PathBuf::from("/nonexistent/journal-dot"),
            ..GraphvizRenderer::default()
        };

        let err = renderer.render(&wide_graph(1)).unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn large_input_and_noisy_stderr_do_not_block() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-dot");
        // Floods stderr before reading stdin, then echoes stdin back.
        std::fs::write(
            &script,
            "#!/bin/sh\nhead -c 262144 /dev/zero >&2\ncat\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let graph = wide_graph(5_000);
        let expected = to_dot(&graph);
        assert!(expected.len() > 200_000);

        let renderer = GraphvizRenderer {
            program: script,
            ..GraphvizRenderer::default()
        };
        assert_eq!(renderer.render(&graph).unwrap(), expected);
    }
}
