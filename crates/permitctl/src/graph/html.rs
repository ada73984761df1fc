use std::path::{Path, PathBuf};

use anyhow::Context;
use handlebars::Handlebars;
use rust_embed::RustEmbed;
use serde::Serialize;

use super::assemble::Graph;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

const TEMPLATE: (&str, &str) = ("graph", "graph.html.hbs");

#[derive(Serialize, Debug)]
struct TemplateData {
    title: String,
    /// Cytoscape elements as a JavaScript literal.
    elements: String,
}

pub struct Renderer<'a> {
    reg: Handlebars<'a>,
}

impl Renderer<'_> {
    pub fn new() -> anyhow::Result<Self> {
        let mut reg = Handlebars::new();
        reg.set_strict_mode(true);

        let (name, path) = TEMPLATE;
        let template = Assets::get(path).context("getting embedded graph template")?;
        reg.register_template_string(
            name,
            std::str::from_utf8(&template.data).context("converting template string to utf8")?,
        )
        .context("registering template string")?;

        Ok(Self { reg })
    }

    pub fn render(&self, graph: &Graph, title: &str) -> anyhow::Result<String> {
        let data = TemplateData {
            title: title.to_string(),
            elements: elements(graph)?,
        };
        Ok(self.reg.render(TEMPLATE.0, &data)?)
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum ElementData<'a> {
    Node {
        id: &'a str,
        label: &'a str,
    },
    Edge {
        source: &'a str,
        target: &'a str,
        label: &'a str,
    },
}

#[derive(Serialize)]
struct Element<'a> {
    data: ElementData<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classes: Option<&'static str>,
}

/// Serialize `graph` as Cytoscape elements. The result is safe to embed
/// within a `<script>` element.
fn elements(graph: &Graph) -> anyhow::Result<String> {
    let nodes = graph.nodes.iter().map(|node| Element {
        data: ElementData::Node {
            id: &node.id,
            label: &node.label,
        },
        classes: node.classes.map(|c| c.as_str()),
    });
    // Edges always carry a class, possibly empty.
    let edges = graph.edges.iter().map(|edge| Element {
        data: ElementData::Edge {
            source: &edge.source,
            target: &edge.target,
            label: &edge.label,
        },
        classes: Some(edge.classes.map(|c| c.as_str()).unwrap_or_default()),
    });
    let elements: Vec<Element> = nodes.chain(edges).collect();

    let json = serde_json::to_string_pretty(&elements).context("serializing graph elements")?;
    Ok(json.replace("</", "<\\/"))
}

/// Render `graph` as a standalone HTML page.
pub fn render_html(graph: &Graph, title: &str) -> anyhow::Result<String> {
    Renderer::new()?.render(graph, title)
}

/// Write the HTML page of `graph` to `path`, returning its absolute path.
pub fn save_html(graph: &Graph, title: &str, path: &Path) -> anyhow::Result<PathBuf> {
    let html = render_html(graph, title)?;

    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("getting the current directory")?
            .join(path)
    };
    std::fs::write(&path, html).with_context(|| format!("writing graph to {}", path.display()))?;

    tracing::info!(path = %path.display(), "saved graph");
    Ok(path)
}
