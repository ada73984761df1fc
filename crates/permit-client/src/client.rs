use crate::{api_exec, models};

/// Client of the Permit.io REST API. It's cheaply cloneable: clones share
/// the underlying connection pool.
#[derive(Clone)]
pub struct Client {
    // Base URL of the REST API, such as `https://api.permit.io/`.
    api_url: url::Url,
    // HTTP client to use for REST requests.
    http_client: reqwest::Client,
    // API key sent as a bearer token, if authenticated.
    api_key: Option<String>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("api_url", &self.api_url.as_str())
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

impl Client {
    pub fn new(api_url: url::Url, api_key: Option<String>) -> Self {
        Self {
            api_url,
            http_client: reqwest::Client::new(),
            api_key,
        }
    }

    pub fn with_api_key(self, api_key: Option<String>) -> Self {
        Self { api_key, ..self }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> anyhow::Result<reqwest::RequestBuilder> {
        let url = self.api_url.join(path.trim_start_matches('/'))?;
        let mut builder = self.http_client.request(method, url);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        Ok(builder)
    }

    pub fn get(&self, path: &str) -> anyhow::Result<reqwest::RequestBuilder> {
        self.request(reqwest::Method::GET, path)
    }

    pub fn post(&self, path: &str) -> anyhow::Result<reqwest::RequestBuilder> {
        self.request(reqwest::Method::POST, path)
    }

    pub fn delete(&self, path: &str) -> anyhow::Result<reqwest::RequestBuilder> {
        self.request(reqwest::Method::DELETE, path)
    }

    pub async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        api_exec(self.get(path)?.query(query)).await
    }

    pub async fn post_json<Request, Response>(
        &self,
        path: &str,
        body: &Request,
    ) -> anyhow::Result<Response>
    where
        Request: serde::Serialize + ?Sized,
        Response: serde::de::DeserializeOwned,
    {
        api_exec(self.post(path)?.json(body)).await
    }

    pub async fn delete_json<Request, Response>(
        &self,
        path: &str,
        body: &Request,
    ) -> anyhow::Result<Response>
    where
        Request: serde::Serialize + ?Sized,
        Response: serde::de::DeserializeOwned,
    {
        api_exec(self.delete(path)?.json(body)).await
    }
}

#[tracing::instrument(skip(client), err)]
pub async fn fetch_api_key_scope(client: &Client) -> anyhow::Result<models::ApiKeyScope> {
    client.get_json("v2/api-key/scope", &[]).await
}

pub async fn fetch_organization(client: &Client, org: &str) -> anyhow::Result<models::Organization> {
    client.get_json(&format!("v2/orgs/{org}"), &[]).await
}

pub async fn fetch_projects(client: &Client) -> anyhow::Result<Vec<models::Project>> {
    client.get_json("v2/projects", &[]).await
}

pub async fn fetch_project(client: &Client, project: &str) -> anyhow::Result<models::Project> {
    client.get_json(&format!("v2/projects/{project}"), &[]).await
}

pub async fn fetch_environments(
    client: &Client,
    project: &str,
) -> anyhow::Result<Vec<models::Environment>> {
    client
        .get_json(&format!("v2/projects/{project}/envs"), &[])
        .await
}

pub async fn fetch_environment(
    client: &Client,
    project: &str,
    env: &str,
) -> anyhow::Result<models::Environment> {
    client
        .get_json(&format!("v2/projects/{project}/envs/{env}"), &[])
        .await
}

/// Path prefix of the facts API for a project and environment.
pub fn facts_path(project: &str, env: &str) -> String {
    format!("v2/facts/{project}/{env}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_join_paths_onto_the_api_url() {
        let client = Client::new(
            url::Url::parse("https://api.example.com/").unwrap(),
            Some("permit_key_secret".to_string()),
        );
        let req = client
            .get("/v2/projects")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(req.url().as_str(), "https://api.example.com/v2/projects");
        assert_eq!(
            req.headers()
                .get(reqwest::header::AUTHORIZATION)
                .unwrap()
                .to_str()
                .unwrap(),
            "Bearer permit_key_secret"
        );

        let anon = client.with_api_key(None);
        let req = anon.get("v2/projects").unwrap().build().unwrap();
        assert!(req.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn debug_does_not_leak_the_key() {
        let client = Client::new(
            url::Url::parse("https://api.example.com/").unwrap(),
            Some("permit_key_secret".to_string()),
        );
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("secret"), "{dbg}");
        assert!(dbg.contains("authenticated: true"), "{dbg}");
    }

    #[test]
    fn facts_paths() {
        assert_eq!(facts_path("proj", "env"), "v2/facts/proj/env");
    }
}
