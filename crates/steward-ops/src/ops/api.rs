//! HTTP API operator.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::ops::write_file;
use crate::template::TemplateEngine;

/// Call an HTTP endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiOp {
    /// Endpoint URL.
    pub api: String,

    /// HTTP method (default: GET).
    pub method: Option<String>,

    /// Request headers.
    pub headers: HashMap<String, String>,

    /// Request body.
    pub body: Option<String>,

    /// File receiving the response body.
    #[serde(rename = "jsonFile")]
    pub json_file: Option<String>,
}

impl ApiOp {
    fn method(&self) -> Result<Method, OperatorError> {
        let name = self.method.as_deref().unwrap_or("GET").to_uppercase();
        Method::from_bytes(name.as_bytes())
            .map_err(|_| OperatorError::Configuration(format!("Invalid HTTP method: {}", name)))
    }
}

impl Schema for ApiOp {
    fn is_selected(&self) -> bool {
        !self.api.is_empty()
    }
}

#[async_trait]
impl Execute for ApiOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        let engine = TemplateEngine::new();
        let url = engine.render(&self.api, &ctx.variables)?;
        let method = self.method()?;

        let mut request = ctx.fetcher.client().request(method.clone(), &url);
        for (name, value) in &self.headers {
            request = request.header(name, engine.render(value, &ctx.variables)?);
        }
        if let Some(body) = &self.body {
            request = request.body(engine.render(body, &ctx.variables)?);
        }

        tracing::debug!(method = %method, url = %url, "Sending API request");
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(OperatorError::Http(format!(
                "{} {} returned {}",
                method, url, status
            )));
        }

        if let Some(path) = &self.json_file {
            let path = engine.render(path, &ctx.variables)?;
            write_file(Path::new(&path), &body, None).await?;
        }

        tracing::info!(method = %method, url = %url, status = status.as_u16(), "API call succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Fetcher;

    #[test]
    fn test_method_parsing() {
        let mut op = ApiOp {
            api: "https://example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(op.method().unwrap(), Method::GET);

        op.method = Some("post".to_string());
        assert_eq!(op.method().unwrap(), Method::POST);

        op.method = Some("NOT A METHOD".to_string());
        assert!(matches!(op.method(), Err(OperatorError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_request_uses_context_client() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8_lossy(&buf[..n]).to_lowercase()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-steward-agent", "shared".parse().unwrap());
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap();
        let ctx = OperatorContext::new(std::env::temp_dir(), Fetcher::with_client(client));

        let op = ApiOp {
            api: format!("http://{}/hook", addr),
            ..Default::default()
        };
        op.execute(&ctx).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("get /hook"));
        assert!(request.contains("x-steward-agent: shared"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let op = ApiOp {
            api: "http://127.0.0.1:9/hook".to_string(),
            ..Default::default()
        };
        let result = op.execute(&OperatorContext::default()).await;
        assert!(matches!(result, Err(OperatorError::Http(_))));
    }
}
