//! Supabase (PostgREST) row store backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

use super::{Filter, Order, Row, RowStore};

/// Row store backed by the Supabase REST endpoint
pub struct SupabaseStore {
    client: Client,
    rest_url: String,
    schema: String,
}

/// Error body returned by PostgREST
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl SupabaseStore {
    pub fn new(
        url: String,
        service_key: String,
        schema: String,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&service_key)
                .map_err(|_| Error::config("service key contains invalid header characters"))?,
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", service_key))
                .map_err(|_| Error::config("service key contains invalid header characters"))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            schema,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    // Tables outside `public` need the profile headers.
    fn with_profile(&self, request: RequestBuilder, write: bool) -> RequestBuilder {
        if self.schema == "public" {
            return request;
        }
        let name = if write {
            "Content-Profile"
        } else {
            "Accept-Profile"
        };
        request.header(name, self.schema.as_str())
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::store(error_message(status.as_u16(), &body)))
    }
}

/// Build PostgREST query pairs for filters and ordering
pub fn query_pairs(filters: &[Filter], order: Option<&Order>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = filters
        .iter()
        .map(|f| {
            (
                f.column.clone(),
                format!("{}.{}", f.op.as_str(), filter_value(&f.value)),
            )
        })
        .collect();

    if let Some(order) = order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }

    pairs
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Turn a failed PostgREST response into the message surfaced to callers
pub fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(PostgrestError {
            message: Some(message),
            ..
        }) => message,
        Ok(PostgrestError {
            code, details, ..
        }) if code.is_some() || details.is_some() => format!(
            "{} ({})",
            details.unwrap_or_default(),
            code.unwrap_or_default()
        ),
        _ if body.trim().is_empty() => format!("HTTP {}", status),
        _ => format!("HTTP {}: {}", status, body.trim()),
    }
}

#[async_trait]
impl RowStore for SupabaseStore {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&Order>,
    ) -> Result<Vec<Row>> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(query_pairs(filters, order));

        let request = self
            .client
            .get(self.table_url(table))
            .query(&pairs);
        let response = Self::send(self.with_profile(request, false)).await?;

        let rows = response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| Error::store(format!("invalid select response: {}", e)))?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let response = Self::send(self.with_profile(request, true)).await?;

        let mut rows = response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| Error::store(format!("invalid insert response: {}", e)))?;
        if rows.is_empty() {
            return Err(Error::store("insert returned no rows"));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<()> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&query_pairs(filters, None))
            .header("Prefer", "return=minimal")
            .json(&patch);
        Self::send(self.with_profile(request, true)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use axum::{
        body::{to_bytes, Body},
        extract::Request,
        http::{HeaderMap, Method, StatusCode},
        Router,
    };
    use serde_json::json;

    /// Request as seen by the stub PostgREST server
    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        path: String,
        query: String,
        headers: HeaderMap,
        body: Value,
    }

    type SeenLog = Arc<Mutex<Vec<Seen>>>;

    /// Serve one canned response for every request on an ephemeral port
    async fn stub_server(status: StatusCode, body: &'static str) -> (String, SeenLog) {
        let seen: SeenLog = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let app = Router::new().fallback(move |request: Request| {
            let sink = sink.clone();
            async move {
                let (parts, request_body) = request.into_parts();
                let bytes = to_bytes(request_body, usize::MAX).await.unwrap_or_default();
                sink.lock().unwrap().push(Seen {
                    method: parts.method,
                    path: parts.uri.path().to_string(),
                    query: parts.uri.query().unwrap_or_default().to_string(),
                    headers: parts.headers,
                    body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
                });
                (
                    status,
                    [("content-type", "application/json")],
                    Body::from(body),
                )
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), seen)
    }

    fn store_at(url: &str, schema: &str) -> SupabaseStore {
        SupabaseStore::new(
            url.to_string(),
            "service-key".to_string(),
            schema.to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn only_request(seen: &SeenLog) -> Seen {
        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests[0].clone()
    }

    #[tokio::test]
    async fn test_select_sends_credentials_filters_and_order() {
        let (url, seen) = stub_server(StatusCode::OK, r#"[{"id":1,"nombre":"Leer"}]"#).await;
        let store = store_at(&url, "public");

        let rows = store
            .select(
                "habit_types",
                &[Filter::eq("user_id", "u1"), Filter::eq("is_active", true)],
                Some(&Order::asc("created_at")),
            )
            .await
            .unwrap();
        assert_eq!(rows, vec![row(json!({"id": 1, "nombre": "Leer"}))]);

        let request = only_request(&seen);
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/rest/v1/habit_types");
        for pair in ["user_id=eq.u1", "is_active=eq.true", "order=created_at.asc"] {
            assert!(request.query.contains(pair), "{} missing from {}", pair, request.query);
        }
        assert_eq!(request.headers["apikey"], "service-key");
        assert_eq!(request.headers["authorization"], "Bearer service-key");
        assert!(request.headers.get("accept-profile").is_none());
    }

    #[tokio::test]
    async fn test_select_uses_accept_profile_outside_public() {
        let (url, seen) = stub_server(StatusCode::OK, "[]").await;
        let store = store_at(&url, "tracking");

        let rows = store.select("habit_types", &[], None).await.unwrap();
        assert!(rows.is_empty());

        let request = only_request(&seen);
        assert_eq!(request.headers["accept-profile"], "tracking");
        assert!(request.headers.get("content-profile").is_none());
    }

    #[tokio::test]
    async fn test_insert_returns_first_representation() {
        let (url, seen) = stub_server(
            StatusCode::CREATED,
            r#"[{"id":42,"user_id":"u1"},{"id":43,"user_id":"u1"}]"#,
        )
        .await;
        let store = store_at(&url, "tracking");

        let inserted = store
            .insert("habit_logs", row(json!({"user_id": "u1", "habit_type_id": "h1"})))
            .await
            .unwrap();
        assert_eq!(inserted["id"], json!(42));

        let request = only_request(&seen);
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/rest/v1/habit_logs");
        assert_eq!(request.headers["prefer"], "return=representation");
        assert_eq!(request.headers["content-profile"], "tracking");
        assert_eq!(request.body, json!({"user_id": "u1", "habit_type_id": "h1"}));
    }

    #[tokio::test]
    async fn test_insert_without_rows_is_a_store_error() {
        let (url, _seen) = stub_server(StatusCode::CREATED, "[]").await;
        let store = store_at(&url, "public");

        let err = store
            .insert("habit_logs", row(json!({"user_id": "u1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(err.to_string(), "insert returned no rows");
    }

    #[tokio::test]
    async fn test_update_patches_by_filter() {
        let (url, seen) = stub_server(StatusCode::NO_CONTENT, "").await;
        let store = store_at(&url, "public");

        store
            .update(
                "habit_logs",
                &[Filter::eq("id", 42)],
                row(json!({"duracion_segundos": 120, "notas": "done"})),
            )
            .await
            .unwrap();

        let request = only_request(&seen);
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.path, "/rest/v1/habit_logs");
        assert_eq!(request.query, "id=eq.42");
        assert_eq!(request.headers["prefer"], "return=minimal");
        assert_eq!(request.body, json!({"duracion_segundos": 120, "notas": "done"}));
    }

    #[tokio::test]
    async fn test_postgrest_error_body_becomes_store_message() {
        let (url, _seen) = stub_server(
            StatusCode::CONFLICT,
            r#"{"code":"23505","details":null,"hint":null,"message":"duplicate key value violates unique constraint"}"#,
        )
        .await;
        let store = store_at(&url, "public");

        let err = store
            .insert("habit_types", row(json!({"user_id": "u1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_store_error() {
        // Grab a free port, then close it so nothing is listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = store_at(&format!("http://{}", addr), "public");
        let err = store.select("habit_types", &[], None).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_handler_surfaces_postgrest_message() {
        use http_body_util::BodyExt;
        use tower::ServiceExt;

        use crate::api::{create_router, AppState};

        let (url, _seen) = stub_server(
            StatusCode::CONFLICT,
            r#"{"code":"23503","message":"violates foreign key constraint \"habit_logs_habit_type_id_fkey\""}"#,
        )
        .await;
        let app = create_router(AppState::new(Arc::new(store_at(&url, "public")), "supabase"));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/logs/event")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"userId": "u1", "habitTypeId": 99}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body["error"],
            "Error al registrar el evento: violates foreign key constraint \"habit_logs_habit_type_id_fkey\""
        );
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(
            &[Filter::eq("user_id", "u1"), Filter::eq("is_active", true)],
            Some(&Order::asc("created_at")),
        );
        assert_eq!(
            pairs,
            vec![
                ("user_id".to_string(), "eq.u1".to_string()),
                ("is_active".to_string(), "eq.true".to_string()),
                ("order".to_string(), "created_at.asc".to_string()),
            ]
        );
    }

    #[test]
    fn test_numeric_filter_value() {
        let pairs = query_pairs(&[Filter::eq("id", 42)], None);
        assert_eq!(pairs, vec![("id".to_string(), "eq.42".to_string())]);
    }

    #[test]
    fn test_error_message_prefers_postgrest_message() {
        let body = r#"{"code":"23503","details":"Key is not present","hint":null,"message":"insert or update on table \"habit_logs\" violates foreign key constraint"}"#;
        assert_eq!(
            error_message(409, body),
            "insert or update on table \"habit_logs\" violates foreign key constraint"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message(502, "Bad Gateway"), "HTTP 502: Bad Gateway");
        assert_eq!(error_message(503, ""), "HTTP 503");
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let store = SupabaseStore::new(
            "https://example.supabase.co/".to_string(),
            "service-key".to_string(),
            "public".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            store.table_url("habit_types"),
            "https://example.supabase.co/rest/v1/habit_types"
        );
    }
}
