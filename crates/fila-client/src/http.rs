use std::sync::RwLock;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use fila_types::api::{
    ErrorBody, JoinQueueRequest, NearbyPharmacy, QueueInfo, QueueStatusResponse, SignInRequest,
    SignInResponse, TicketResponse,
};
use fila_types::models::{Medication, Pickup};

use crate::backend::QueueBackend;
use crate::config::ClientConfig;
use crate::error::QueueError;

/// [`QueueBackend`] over the service's JSON HTTP API.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, QueueError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| QueueError::Transient(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Reuses a token from an earlier sign-in.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, QueueError> {
        match self.token() {
            Some(token) => Ok(builder.header(AUTHORIZATION, format!("Bearer {}", token))),
            None => Err(QueueError::Unauthorized),
        }
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, QueueError> {
    let resp = builder.send().await?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    debug!("Request failed with {}: {}", status, message);
    Err(QueueError::from_status(status.as_u16(), message))
}

async fn decode<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, QueueError> {
    let resp = send(builder).await?;
    resp.json::<T>()
        .await
        .map_err(|e| QueueError::Transient(format!("malformed response: {}", e)))
}

impl QueueBackend for HttpBackend {
    async fn sign_in(&self, req: &SignInRequest) -> Result<SignInResponse, QueueError> {
        let resp: SignInResponse =
            decode(self.client.post(self.url("/auth/sign-in")).json(req)).await?;
        self.set_token(Some(resp.token.clone()));
        Ok(resp)
    }

    async fn nearby_pharmacies(
        &self,
        lat: f64,
        lng: f64,
        radius_km: Option<f64>,
    ) -> Result<Vec<NearbyPharmacy>, QueueError> {
        let mut query = vec![("lat", lat.to_string()), ("lng", lng.to_string())];
        if let Some(radius) = radius_km {
            query.push(("radius_km", radius.to_string()));
        }
        decode(self.client.get(self.url("/pharmacies/nearby")).query(&query)).await
    }

    async fn list_medications(
        &self,
        pharmacy_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<Medication>, QueueError> {
        let mut builder = self.client.get(self.url(&format!("/pharmacies/{}/medications", pharmacy_id)));
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            builder = builder.query(&[("search", term)]);
        }
        decode(builder).await
    }

    async fn queue_info(&self, pharmacy_id: Uuid) -> Result<QueueInfo, QueueError> {
        decode(self.client.get(self.url(&format!("/pharmacies/{}/queue", pharmacy_id)))).await
    }

    async fn join_queue(
        &self,
        pharmacy_id: Uuid,
        req: &JoinQueueRequest,
    ) -> Result<TicketResponse, QueueError> {
        let builder = self
            .client
            .post(self.url(&format!("/pharmacies/{}/check-ins", pharmacy_id)))
            .json(req);
        decode(self.authorized(builder)?).await
    }

    async fn leave_queue(&self, pharmacy_id: Uuid, queue_number: i64) -> Result<(), QueueError> {
        let builder = self
            .client
            .delete(self.url(&format!("/pharmacies/{}/check-ins/{}", pharmacy_id, queue_number)));
        send(self.authorized(builder)?).await?;
        Ok(())
    }

    async fn queue_status(
        &self,
        pharmacy_id: Uuid,
        queue_number: i64,
    ) -> Result<QueueStatusResponse, QueueError> {
        let builder = self
            .client
            .get(self.url(&format!("/pharmacies/{}/queue/status", pharmacy_id)))
            .query(&[("queue_number", queue_number)]);
        decode(self.authorized(builder)?).await
    }

    async fn pickups(&self) -> Result<Vec<Pickup>, QueueError> {
        decode(self.authorized(self.client.get(self.url("/me/pickups")))?).await
    }
}
