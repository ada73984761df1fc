use std::path::PathBuf;

use anyhow::Context;
use permit_client::models;
use permit_client::pagination::{self, PageRequest, PageSource, PAGE_SIZE};

use crate::select::{ProjectEnv, ScopeArgs};

pub mod assemble;
pub mod html;
pub mod relationships;
pub mod resolver;
pub mod roles;

pub use assemble::EdgePasses;

/// A resource instance as graphed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInstance {
    pub id: String,
    /// `"{resource}:{key}"`, the form in which relationships reference it.
    pub id2: String,
    pub label: String,
    pub key: String,
    pub relationships: Vec<models::RawRelationship>,
}

impl From<models::ResourceInstanceDetail> for ResourceInstance {
    fn from(detail: models::ResourceInstanceDetail) -> Self {
        let models::ResourceInstanceDetail {
            id,
            key,
            resource,
            resource_id,
            relationships,
        } = detail;

        Self {
            label: format!("{resource}#{resource_id}"),
            id2: format!("{resource}:{key}"),
            id,
            key,
            relationships,
        }
    }
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Graph {
    #[clap(flatten)]
    scope: ScopeArgs,
    /// Path of the HTML page to write.
    #[clap(long, default_value = "permit-graph.html")]
    output_file: PathBuf,
    /// Don't open the written page in a browser.
    #[clap(long)]
    no_open: bool,
    /// Print the graph as JSON instead of writing an HTML page.
    #[clap(long)]
    json: bool,
    /// Draw each relationship with both the "IS {RELATION} OF" edge from its
    /// owning instance to the raw object reference, and the "{RELATION}" edge
    /// between resolved instances, as earlier permit-cli versions did.
    #[clap(long)]
    compat_edges: bool,
}

/// Result of fetching and assembling the graph of an environment.
#[derive(Debug)]
pub enum Outcome {
    Graph(assemble::Graph),
    /// The environment has no resource instances.
    NoData,
}

impl Graph {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        let scope = self.scope.resolve(ctx).await?;
        let client = ctx.client()?;

        let passes = if self.compat_edges {
            EdgePasses::Compat
        } else {
            EdgePasses::Canonical
        };

        let spinner = spinner(format!(
            "Fetching the graph of project {} environment {}",
            scope.project, scope.env
        ));
        let outcome = build_graph(client, &scope, passes).await;
        spinner.finish_and_clear();

        let graph = match outcome? {
            Outcome::NoData => {
                println!("Environment does not contain any data");
                return Ok(());
            }
            Outcome::Graph(graph) => graph,
        };
        tracing::info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "assembled graph"
        );

        if self.json {
            serde_json::to_writer_pretty(std::io::stdout(), &graph)?;
            println!();
            return Ok(());
        }

        let title = format!("Permit graph of {} / {}", scope.project, scope.env);
        let path = html::save_html(&graph, &title, &self.output_file)?;
        println!("Graph saved to {}", path.display());

        if !self.no_open {
            if let Err(error) = open::that(&path) {
                tracing::warn!(%error, path = %path.display(), "failed to open the graph in a browser");
            }
        }
        Ok(())
    }
}

/// Fetch every resource instance and user of `scope` from `source`, and
/// assemble them into a graph. Pages are requested one at a time.
pub async fn build_graph<S>(
    source: S,
    scope: &ProjectEnv,
    passes: EdgePasses,
) -> anyhow::Result<Outcome>
where
    S: PageSource + Clone + 'static,
{
    let facts = scope.facts_path();

    let details: Vec<models::ResourceInstanceDetail> = pagination::fetch_all(
        source.clone(),
        PageRequest::new(format!("{facts}/resource_instances/detailed")).per_page(PAGE_SIZE),
    )
    .await
    .context("failed to fetch resource instances")?;

    if details.is_empty() {
        return Ok(Outcome::NoData);
    }
    let instances: Vec<ResourceInstance> = details.into_iter().map(Into::into).collect();

    let users: Vec<models::User> = pagination::fetch_all(
        source,
        PageRequest::new(format!("{facts}/users"))
            .param("include_resource_instance_roles", "true")
            .per_page(PAGE_SIZE),
    )
    .await
    .context("failed to fetch users")?;

    tracing::debug!(
        instances = instances.len(),
        users = users.len(),
        "fetched graph data"
    );

    let resolver = resolver::IdentityResolver::new(&instances);
    let relationships = relationships::normalize(&instances, &resolver);
    let assignments = roles::flatten(&users, &resolver);

    Ok(Outcome::Graph(assemble::assemble(
        &instances,
        &relationships,
        &assignments,
        passes,
    )))
}

fn spinner(message: String) -> indicatif::ProgressBar {
    let spinner = indicatif::ProgressBar::new_spinner().with_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod fixtures {
    use super::ResourceInstance;
    use permit_client::models;

    /// An instance whose resource type id is `"rt-{resource}"`.
    pub(super) fn instance(
        id: &str,
        resource: &str,
        key: &str,
        relationships: Vec<models::RawRelationship>,
    ) -> ResourceInstance {
        models::ResourceInstanceDetail {
            id: id.to_string(),
            key: key.to_string(),
            resource: resource.to_string(),
            resource_id: format!("rt-{resource}"),
            relationships,
        }
        .into()
    }

    pub(super) fn relation(subject: &str, relation: &str, object: &str) -> models::RawRelationship {
        models::RawRelationship {
            subject: subject.to_string(),
            relation: relation.to_string(),
            object: object.to_string(),
        }
    }

    /// A tenant with the given `(resource, resource_instance, role)` records.
    pub(super) fn tenant(roles: &[(&str, &str, &str)]) -> models::AssociatedTenant {
        models::AssociatedTenant {
            tenant: "default".to_string(),
            resource_instance_roles: roles
                .iter()
                .map(|(resource, instance, role)| models::ResourceInstanceRole {
                    resource: resource.to_string(),
                    resource_instance: instance.to_string(),
                    role: role.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub(super) fn user(key: &str, tenants: Vec<models::AssociatedTenant>) -> models::User {
        models::User {
            key: key.to_string(),
            email: if key.is_empty() {
                String::new()
            } else {
                format!("{key}@example.com")
            },
            associated_tenants: tenants,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Serves fixed collections by path, `per_page` items at a time, and
    /// records every requested path and query.
    #[derive(Clone, Default)]
    struct Stub {
        collections: Arc<Vec<(String, serde_json::Value)>>,
        requests: Arc<Mutex<Vec<String>>>,
        fail: Option<&'static str>,
    }

    impl Stub {
        fn new(collections: Vec<(&str, serde_json::Value)>) -> Self {
            Self {
                collections: Arc::new(
                    collections
                        .into_iter()
                        .map(|(path, items)| (path.to_string(), items))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for Stub {
        async fn fetch_page(
            &self,
            path: &str,
            query: &[(String, String)],
        ) -> anyhow::Result<serde_json::Value> {
            let encoded: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            self.requests
                .lock()
                .unwrap()
                .push(format!("{path}?{}", encoded.join("&")));

            if self.fail.is_some_and(|fail| path.ends_with(fail)) {
                anyhow::bail!("500 Internal Server Error: boom");
            }

            let get = |key: &str| -> usize {
                query
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.parse().unwrap())
                    .unwrap()
            };
            let (page, per_page) = (get("page"), get("per_page"));

            let items = self
                .collections
                .iter()
                .find(|(p, _)| p == path)
                .and_then(|(_, items)| items.as_array().cloned())
                .unwrap_or_default();
            let page: Vec<_> = items
                .into_iter()
                .skip((page - 1) * per_page)
                .take(per_page)
                .collect();

            Ok(serde_json::json!({ "data": page }))
        }
    }

    fn scope() -> ProjectEnv {
        ProjectEnv {
            project: "proj".to_string(),
            env: "env".to_string(),
        }
    }

    fn end_to_end_stub() -> Stub {
        Stub::new(vec![
            (
                "v2/facts/proj/env/resource_instances/detailed",
                serde_json::json!([
                    {
                        "id": "ri-a",
                        "key": "d1",
                        "resource": "document",
                        "resource_id": "rt-doc",
                        "relationships": [
                            {"subject": "document:d1", "relation": "parent", "object": "folder:f1"}
                        ]
                    },
                    {
                        "id": "ri-b",
                        "key": "f1",
                        "resource": "folder",
                        "resource_id": "rt-folder",
                        "relationships": null
                    }
                ]),
            ),
            (
                "v2/facts/proj/env/users",
                serde_json::json!([{"key": "u1", "email": "u1@example.com", "associated_tenants": []}]),
            ),
        ])
    }

    #[test]
    fn instances_from_details() {
        let instance = fixtures::instance("ri-a", "document", "d1", vec![]);
        assert_eq!(instance.id2, "document:d1");
        assert_eq!(instance.label, "document#rt-document");
        assert_eq!(instance.key, "d1");
    }

    #[tokio::test]
    async fn builds_the_end_to_end_graph() {
        let stub = end_to_end_stub();
        let Outcome::Graph(graph) = build_graph(stub.clone(), &scope(), EdgePasses::Canonical)
            .await
            .unwrap()
        else {
            panic!("expected a graph");
        };

        insta::assert_json_snapshot!(graph, @r###"
        {
          "nodes": [
            {
              "id": "ri-a",
              "label": " document#rt-doc",
              "classes": "resource-instance-node"
            },
            {
              "id": "ri-b",
              "label": " folder#rt-folder",
              "classes": "resource-instance-node"
            },
            {
              "id": "u1",
              "label": "u1",
              "classes": "user-node"
            }
          ],
          "edges": [
            {
              "source": "ri-a",
              "target": "ri-b",
              "label": "IS PARENT OF",
              "classes": "relationship-connection"
            }
          ]
        }
        "###);

        assert_eq!(
            stub.requests(),
            vec![
                "v2/facts/proj/env/resource_instances/detailed?page=1&per_page=100",
                "v2/facts/proj/env/users?include_resource_instance_roles=true&page=1&per_page=100",
            ]
        );
    }

    #[tokio::test]
    async fn empty_environments_have_no_data() {
        let stub = Stub::new(vec![]);
        let outcome = build_graph(stub.clone(), &scope(), EdgePasses::Canonical)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::NoData));
        // Users aren't fetched.
        assert_eq!(stub.requests().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failures_abort_the_run() {
        let mut stub = end_to_end_stub();
        stub.fail = Some("/users");

        let err = build_graph(stub, &scope(), EdgePasses::Canonical)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to fetch users");
    }

    #[tokio::test]
    async fn instances_span_pages() {
        let instances: Vec<_> = (0..250)
            .map(|n| {
                serde_json::json!({
                    "id": format!("ri-{n}"),
                    "key": format!("k{n}"),
                    "resource": "document",
                })
            })
            .collect();
        let stub = Stub::new(vec![(
            "v2/facts/proj/env/resource_instances/detailed",
            serde_json::Value::Array(instances),
        )]);

        let Outcome::Graph(graph) = build_graph(stub.clone(), &scope(), EdgePasses::Canonical)
            .await
            .unwrap()
        else {
            panic!("expected a graph");
        };
        assert_eq!(graph.nodes.len(), 250);
        assert_eq!(graph.nodes[249].id, "ri-249");
        // Three pages of instances, then one empty page of users.
        assert_eq!(stub.requests().len(), 4);
    }

    #[tokio::test]
    async fn null_fields_become_unknown_nodes_and_labels() {
        let stub = Stub::new(vec![
            (
                "v2/facts/proj/env/resource_instances/detailed",
                serde_json::json!([
                    {
                        "id": "ri-a",
                        "key": "d1",
                        "resource": "document",
                        "resource_id": "rt-doc",
                        "relationships": [
                            {"subject": "document:d1", "relation": null, "object": "folder:f1"}
                        ]
                    },
                    {"id": "ri-b", "key": "f1", "resource": "folder", "resource_id": "rt-folder"}
                ]),
            ),
            (
                "v2/facts/proj/env/users",
                serde_json::json!([{
                    "key": null,
                    "email": null,
                    "associated_tenants": [{
                        "tenant": "default",
                        "resource_instance_roles": [
                            {"resource": "document", "resource_instance": null, "role": null}
                        ]
                    }]
                }]),
            ),
        ]);

        let Outcome::Graph(graph) = build_graph(stub, &scope(), EdgePasses::Canonical)
            .await
            .unwrap()
        else {
            panic!("expected a graph");
        };

        insta::assert_json_snapshot!(graph, @r###"
        {
          "nodes": [
            {
              "id": "ri-a",
              "label": " document#rt-doc",
              "classes": "resource-instance-node"
            },
            {
              "id": "ri-b",
              "label": " folder#rt-folder",
              "classes": "resource-instance-node"
            },
            {
              "id": "Unknown User",
              "label": "Unknown User",
              "classes": "user-node"
            },
            {
              "id": "Unknown Resource Instance",
              "label": "Unknown Resource Instance",
              "classes": "resource-instance-node"
            }
          ],
          "edges": [
            {
              "source": "ri-a",
              "target": "ri-b",
              "label": "IS UNKNOWN RELATION OF",
              "classes": "relationship-connection"
            },
            {
              "source": "Unknown User",
              "target": "Unknown Resource Instance",
              "label": "Unknown Role"
            }
          ]
        }
        "###);
    }

    #[derive(Debug, clap::Parser)]
    struct GraphArgs {
        #[clap(flatten)]
        graph: Graph,
    }

    #[test]
    fn json_output_accepts_no_open() {
        use clap::Parser;

        let args = GraphArgs::try_parse_from(["graph", "--json", "--no-open"]).unwrap();
        assert!(args.graph.json);
        assert!(args.graph.no_open);
        assert_eq!(args.graph.output_file, PathBuf::from("permit-graph.html"));
    }
}
