use std::marker::PhantomData;

use anyhow::Context;
use async_trait::async_trait;
use futures::Stream;
use page_turner::PageTurner;
use page_turner::PageTurnerOutput;
use page_turner::TurnedPage;

/// Page size used when fetching whole collections.
pub const PAGE_SIZE: u32 = 100;

/// Something that can fetch one page of a collection endpoint.
/// [`crate::Client`] implements this over HTTP.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> anyhow::Result<serde_json::Value>;
}

#[async_trait]
impl PageSource for crate::Client {
    async fn fetch_page(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> anyhow::Result<serde_json::Value> {
        crate::api_exec(self.get(path)?.query(query)).await
    }
}

/// A page of a collection, which the API returns either wrapped in an
/// envelope or as a bare array.
#[derive(Debug)]
pub enum PageBody<T> {
    Envelope {
        data: Vec<T>,
        total_count: Option<u64>,
    },
    Bare(Vec<T>),
}

impl<T: serde::de::DeserializeOwned> PageBody<T> {
    pub fn from_value(value: serde_json::Value) -> anyhow::Result<Self> {
        match value {
            serde_json::Value::Object(mut envelope) if envelope.contains_key("data") => {
                let data = envelope.remove("data").unwrap_or_default();
                let data = serde_json::from_value(data).context("deserializing page data")?;
                let total_count = envelope
                    .get("total_count")
                    .and_then(serde_json::Value::as_u64);
                Ok(PageBody::Envelope { data, total_count })
            }
            items @ serde_json::Value::Array(_) => serde_json::from_value(items)
                .map(PageBody::Bare)
                .context("deserializing page items"),
            other => anyhow::bail!(
                "expected a page object with `data` or an array, got {}",
                value_kind(&other)
            ),
        }
    }
}

fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object without `data`",
    }
}

impl<T> PageBody<T> {
    pub fn total_count(&self) -> Option<u64> {
        match self {
            PageBody::Envelope { total_count, .. } => *total_count,
            PageBody::Bare(_) => None,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            PageBody::Envelope { data, .. } => data,
            PageBody::Bare(items) => items,
        }
    }
}

/// A request for one page of a collection endpoint. Used in
/// [`page_turner::PageTurner`] to implement pagination.
#[derive(Debug, Clone)]
pub struct PageRequest {
    path: String,
    params: Vec<(String, String)>,
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Request the first page of `path` using the default [`PAGE_SIZE`].
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
            page: 1,
            per_page: PAGE_SIZE,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters of this page, with `page` and `per_page` last.
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = self.params.clone();
        query.push(("page".to_string(), self.page.to_string()));
        query.push(("per_page".to_string(), self.per_page.to_string()));
        query
    }

    fn next_page(mut self) -> Self {
        self.page += 1;
        self
    }

    async fn fetch<S, T>(&self, source: &S) -> anyhow::Result<PageBody<T>>
    where
        S: PageSource + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let body = source
            .fetch_page(&self.path, &self.query())
            .await
            .with_context(|| format!("fetching page {} of {}", self.page, self.path))?;
        PageBody::from_value(body)
    }
}

/// Turns the pages of a [`PageSource`] into a stream of items.
pub struct Pager<S, Item> {
    source: S,
    phantom: PhantomData<fn() -> Item>,
}

impl<S, Item> Pager<S, Item> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            phantom: PhantomData,
        }
    }
}

/// Stream every item of the collection of `request`, requesting one page at a
/// time until a page comes back with fewer than `per_page` items. An error
/// ends the stream.
pub fn into_items<S, T>(
    source: S,
    request: PageRequest,
) -> impl Stream<Item = Result<T, anyhow::Error>>
where
    S: PageSource + 'static,
    T: serde::de::DeserializeOwned + Send + Sync + 'static,
{
    Pager::<S, T>::new(source).into_pages(request).items()
}

/// Collect every item of the collection of `request`. No partial result is
/// returned if any page fails.
pub async fn fetch_all<S, T>(source: S, request: PageRequest) -> anyhow::Result<Vec<T>>
where
    S: PageSource + 'static,
    T: serde::de::DeserializeOwned + Send + Sync + 'static,
{
    use futures::TryStreamExt;

    let items = into_items(source, request).try_collect().await?;

    Ok(items)
}

#[async_trait]
impl<S, Item> PageTurner<PageRequest> for Pager<S, Item>
where
    S: PageSource,
    Item: serde::de::DeserializeOwned + Send + Sync,
{
    type PageItem = Item;
    type PageError = anyhow::Error;

    async fn turn_page(&self, request: PageRequest) -> PageTurnerOutput<Self, PageRequest> {
        let items = request.fetch::<S, Item>(&self.source).await?.into_items();
        let item_count = items.len();

        if item_count >= request.per_page as usize {
            tracing::debug!(
                path = %request.path,
                page = request.page,
                item_count,
                "Got back a full page, progressing to the next page"
            );
            Ok(TurnedPage::next(items, request.next_page()))
        } else {
            tracing::debug!(
                path = %request.path,
                page = request.page,
                item_count,
                "Got back a non-full page so we're done"
            );
            Ok(TurnedPage::last(items))
        }
    }
}

/// Fetch every page of `request` by reading `total_count` from its first page
/// and then requesting all remaining pages concurrently. Items are returned in
/// page order. Returns the items along with the reported total count.
pub async fn fetch_all_by_count<S, T>(
    source: &S,
    request: PageRequest,
) -> anyhow::Result<(Vec<T>, u64)>
where
    S: PageSource + ?Sized,
    T: serde::de::DeserializeOwned + Send,
{
    let first: PageBody<T> = request.fetch(source).await?;
    let total_count = first.total_count();
    let mut items = first.into_items();

    let Some(total_count) = total_count else {
        tracing::debug!(path = %request.path, "page has no total_count, treating it as the only page");
        let count = items.len() as u64;
        return Ok((items, count));
    };

    let per_page = request.per_page as u64;
    let total_pages = (total_count + per_page - 1) / per_page;
    let first_page = request.page as u64;
    tracing::debug!(path = %request.path, total_count, total_pages, "fetching remaining pages");

    let remaining = (first_page + 1..=total_pages).map(|page| {
        let request = request.clone().page(page as u32);
        async move { request.fetch::<S, T>(source).await }
    });

    for page in futures::future::try_join_all(remaining).await? {
        items.extend(page.into_items());
    }
    Ok((items, total_count))
}
