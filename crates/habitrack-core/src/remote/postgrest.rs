//! PostgREST client for the hosted backend.
//!
//! Speaks the `/rest/v1/{table}` dialect: filters become `col=op.value`
//! query pairs, and writes ask for `return=representation` so the stored
//! row comes back in the response.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use url::Url;

use super::{FilterOp, Query, RemoteStore};
use crate::error::RemoteError;

/// Remote store backed by a PostgREST endpoint.
pub struct PostgrestStore {
    client: Client,
    base_url: Url,
    api_key: String,
    access_token: Option<String>,
}

impl PostgrestStore {
    /// `base_url` is the project root (e.g. `https://xyz.supabase.co`).
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RemoteError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Unavailable(format!("invalid backend url '{base_url}': {e}")))?;
        // `join` replaces the last segment unless the path ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            api_key: api_key.to_string(),
            access_token: None,
        })
    }

    /// Authenticate requests as a signed-in user instead of the anon role.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table_url(&self, table: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(&format!("rest/v1/{table}"))
            .map_err(|e| RemoteError::Unavailable(e.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .header("Prefer", "return=representation")
    }

    fn by_id(&self, table: &str, id: &str) -> Result<Url, RemoteError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        Ok(url)
    }
}

/// Encode a query as PostgREST query pairs.
pub(crate) fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), "*".to_string())];
    for filter in &query.filters {
        let value = match &filter.op {
            FilterOp::Eq(v) => format!("eq.{v}"),
            FilterOp::Gte(v) => format!("gte.{v}"),
            FilterOp::In(values) => {
                let quoted = values
                    .iter()
                    .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("in.({quoted})")
            }
        };
        pairs.push((filter.column.clone(), value));
    }
    if let Some(order) = &query.order {
        let dir = if order.descending { "desc" } else { "asc" };
        pairs.push(("order".to_string(), format!("{}.{dir}", order.column)));
    }
    pairs
}

pub(crate) async fn check(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    // PostgREST reports `message`; the auth endpoints use `msg` or `error_description`.
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(String::from))
        })
        .unwrap_or(body);
    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

fn first_row(rows: Value, table: &str, id: &str) -> Result<Value, RemoteError> {
    match rows {
        Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
        Value::Object(_) => Ok(rows),
        _ => Err(RemoteError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        }),
    }
}

#[async_trait]
impl RemoteStore for PostgrestStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, RemoteError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().extend_pairs(query_pairs(query));
        tracing::debug!(table, %url, "select");

        let resp = check(self.request(Method::GET, url).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        let url = self.table_url(table)?;
        tracing::debug!(table, "insert");

        let resp = check(self.request(Method::POST, url).json(&row).send().await?).await?;
        first_row(resp.json().await?, table, "<new>")
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, RemoteError> {
        let url = self.by_id(table, id)?;
        tracing::debug!(table, id, "update");

        let resp = check(self.request(Method::PATCH, url).json(&patch).send().await?).await?;
        first_row(resp.json().await?, table, id)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        let url = self.by_id(table, id)?;
        tracing::debug!(table, id, "delete");

        check(self.request(Method::DELETE, url).send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn query_pairs_encode_filters_and_order() {
        let q = Query::new()
            .eq("user_id", "u1")
            .in_list("habit_id", ["a", "b"])
            .order_desc("created_at");
        let pairs = query_pairs(&q);
        assert_eq!(pairs[0], ("select".into(), "*".into()));
        assert_eq!(pairs[1], ("user_id".into(), "eq.u1".into()));
        assert_eq!(pairs[2], ("habit_id".into(), "in.(\"a\",\"b\")".into()));
        assert_eq!(pairs[3], ("order".into(), "created_at.desc".into()));
    }

    #[tokio::test]
    async fn select_sends_filters_and_keys() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/habits")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("user_id".into(), "eq.u1".into()),
                Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
            ]))
            .match_header("apikey", "anon")
            .match_header("authorization", "Bearer user-token")
            .with_status(200)
            .with_body(r#"[{"id":"h1"}]"#)
            .create_async()
            .await;

        let store = PostgrestStore::new(&server.url(), "anon")
            .unwrap()
            .with_access_token("user-token");
        let rows = store
            .select("habits", &Query::new().eq("user_id", "u1").order_desc("created_at"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows, vec![json!({"id": "h1"})]);
    }

    #[tokio::test]
    async fn insert_returns_stored_row() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/habits")
            .match_header("prefer", "return=representation")
            .match_body(Matcher::PartialJson(json!({"title": "Read"})))
            .with_status(201)
            .with_body(r#"[{"id":"h9","title":"Read"}]"#)
            .create_async()
            .await;

        let store = PostgrestStore::new(&server.url(), "anon").unwrap();
        let row = store.insert("habits", json!({"title": "Read"})).await.unwrap();
        assert_eq!(row["id"], "h9");
    }

    #[tokio::test]
    async fn update_with_no_matching_row_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/rest/v1/habits")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.missing".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let store = PostgrestStore::new(&server.url(), "anon").unwrap();
        let err = store
            .update("habits", "missing", json!({"title": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn error_status_surfaces_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/rest/v1/habits")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"message":"permission denied for table habits"}"#)
            .create_async()
            .await;

        let store = PostgrestStore::new(&server.url(), "anon").unwrap();
        match store.delete("habits", "h1").await {
            Err(RemoteError::Status { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "permission denied for table habits");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(PostgrestStore::new("not a url", "anon").is_err());
    }
}
