//! HTTP client for one replica endpoint

use crate::cluster::ReplicaId;
use crate::common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Any transport failure or non-2xx answer is reported as `ReplicaUnreachable`.
#[derive(Clone)]
pub struct RemoteEndpoint {
    id: ReplicaId,
    base_url: String,
    http: reqwest::Client,
}

impl RemoteEndpoint {
    pub fn new(id: ReplicaId, base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            id,
            base_url: base_url.into(),
            http,
        }
    }

    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let request = self.http.post(self.url(path)).json(body);
        let response = self.send(path, request).await?;
        response.json().await.map_err(|e| self.unreachable(e))
    }

    pub async fn get<Resp: DeserializeOwned>(&self, path: &str) -> Result<Resp> {
        let response = self.send(path, self.http.get(self.url(path))).await?;
        response.json().await.map_err(|e| self.unreachable(e))
    }

    pub async fn put<Req: Serialize + ?Sized>(&self, path: &str, body: &Req) -> Result<()> {
        self.send(path, self.http.put(self.url(path)).json(body))
            .await
            .map(drop)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(path, self.http.delete(self.url(path)))
            .await
            .map(drop)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, path: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| self.unreachable(e))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ReplicaUnreachable {
                replica: self.id,
                reason: format!("{} returned {}: {}", path, status, body),
            });
        }
        Ok(response)
    }

    fn unreachable(&self, e: reqwest::Error) -> Error {
        Error::ReplicaUnreachable {
            replica: self.id,
            reason: e.to_string(),
        }
    }
}
