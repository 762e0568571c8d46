//! `ComputePlatform` over the Compute Engine v1 REST API

use crate::config::GoogleConfig;
use crate::error::{GoogleError, Result};
use crate::wire::{
    AggregatedListDto, DiskPayload, ErrorEnvelope, FirewallPayload, InstancePayload, ListDto,
    NetworkPayload, OperationDto, SetTagsPayload, resource_from_json,
};
use async_trait::async_trait;
use gceflow_cloud::{
    ComputePlatform, ListFilter, Operation, OperationHandle, Resource, ResourceKind,
    ResourceRequest, ResourceUpdate, Scope,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub struct GooglePlatform {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl GooglePlatform {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    fn collection_url(&self, kind: ResourceKind, scope: &Scope) -> String {
        let scope = if kind.is_zonal() {
            scope.clone()
        } else {
            Scope::Global
        };
        format!(
            "{}/{}/{}",
            self.config.project_url(),
            scope.path(),
            kind.collection()
        )
    }

    fn resource_url(&self, kind: ResourceKind, scope: &Scope, name: &str) -> String {
        format!("{}/{}", self.collection_url(kind, scope), name)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }

    async fn mutate<P: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        payload: Option<&P>,
    ) -> Result<OperationDto> {
        tracing::debug!("{} {}", method, url);
        let mut request = self.request(method, url);
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        self.send(request).await
    }

    /// Drain every page of a plain or aggregated list
    async fn list_pages(&self, url: &str, aggregated: Option<&str>) -> Result<Vec<serde_json::Value>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.request(Method::GET, url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let next = match aggregated {
                Some(collection) => {
                    let page: AggregatedListDto = self.send(request).await?;
                    let next = page.next_page_token.clone();
                    items.extend(page.into_items(collection));
                    next
                }
                None => {
                    let page: ListDto = self.send(request).await?;
                    items.extend(page.items);
                    page.next_page_token
                }
            };

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }
}

fn api_error(status: StatusCode, body: &str) -> GoogleError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let reason = envelope
                .error
                .errors
                .first()
                .map(|e| e.reason.clone())
                .unwrap_or_default();
            let message = if envelope.error.message.is_empty() {
                envelope
                    .error
                    .errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_default()
            } else {
                envelope.error.message
            };
            GoogleError::Api {
                status: envelope.error.code,
                reason,
                message,
            }
        }
        Err(_) => GoogleError::Api {
            status: status.as_u16(),
            reason: String::new(),
            message: status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        },
    }
}

#[async_trait]
impl ComputePlatform for GooglePlatform {
    fn name(&self) -> &str {
        "google-compute-engine"
    }

    async fn get(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
    ) -> gceflow_cloud::Result<Option<Resource>> {
        let url = self.resource_url(kind, scope, name);
        match self
            .send::<serde_json::Value>(self.request(Method::GET, &url))
            .await
        {
            Ok(value) => Ok(Some(resource_from_json(kind, value)?)),
            Err(GoogleError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> gceflow_cloud::Result<Vec<Resource>> {
        let items = match (&filter.scope, kind.is_zonal()) {
            (Some(scope @ Scope::Zone(_)), true) => {
                self.list_pages(&self.collection_url(kind, scope), None)
                    .await?
            }
            (_, true) => {
                let url = format!(
                    "{}/aggregated/{}",
                    self.config.project_url(),
                    kind.collection()
                );
                self.list_pages(&url, Some(kind.collection())).await?
            }
            (_, false) => {
                self.list_pages(&self.collection_url(kind, &Scope::Global), None)
                    .await?
            }
        };

        let mut resources = Vec::with_capacity(items.len());
        for item in items {
            let resource = resource_from_json(kind, item)?;
            if filter.matches(&resource) {
                resources.push(resource);
            }
        }
        Ok(resources)
    }

    async fn insert(
        &self,
        scope: &Scope,
        request: ResourceRequest,
    ) -> gceflow_cloud::Result<OperationHandle> {
        let kind = request.kind();
        let url = self.collection_url(kind, scope);
        let dto = match &request {
            ResourceRequest::Network(r) => {
                self.mutate(Method::POST, &url, Some(&NetworkPayload::from(r)))
                    .await?
            }
            ResourceRequest::Firewall(r) => {
                self.mutate(Method::POST, &url, Some(&FirewallPayload::from(r)))
                    .await?
            }
            ResourceRequest::Disk(r) => {
                self.mutate(Method::POST, &url, Some(&DiskPayload::from(r)))
                    .await?
            }
            ResourceRequest::Instance(r) => {
                self.mutate(Method::POST, &url, Some(&InstancePayload::from(r)))
                    .await?
            }
        };
        Ok(dto.into_handle(kind, request.name(), scope))
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
    ) -> gceflow_cloud::Result<OperationHandle> {
        let url = self.resource_url(kind, scope, name);
        let dto = self
            .mutate::<serde_json::Value>(Method::DELETE, &url, None)
            .await?;
        Ok(dto.into_handle(kind, name, scope))
    }

    async fn update(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
        update: ResourceUpdate,
    ) -> gceflow_cloud::Result<OperationHandle> {
        let url = format!("{}/{}", self.resource_url(kind, scope, name), update.method());
        let dto = match &update {
            ResourceUpdate::SetTags(tags) => {
                self.mutate(Method::POST, &url, Some(&SetTagsPayload::from(tags)))
                    .await?
            }
        };
        Ok(dto.into_handle(kind, name, scope))
    }

    async fn get_operation(&self, handle: &OperationHandle) -> gceflow_cloud::Result<Operation> {
        let dto: OperationDto = self
            .send(self.request(Method::GET, &handle.self_link))
            .await?;
        Ok(dto.into_operation(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> GooglePlatform {
        GooglePlatform::new(GoogleConfig::new("myproject", "token")).unwrap()
    }

    #[test]
    fn test_urls() {
        let platform = platform();
        assert_eq!(
            platform.resource_url(ResourceKind::Network, &Scope::Global, "jclouds-test"),
            "https://www.googleapis.com/compute/v1/projects/myproject/global/networks/jclouds-test"
        );
        assert_eq!(
            platform.resource_url(ResourceKind::Instance, &Scope::zone("us-central1-a"), "test-1"),
            "https://www.googleapis.com/compute/v1/projects/myproject/zones/us-central1-a/instances/test-1"
        );
        // Global kinds ignore a zonal scope
        assert_eq!(
            platform.collection_url(ResourceKind::Firewall, &Scope::zone("us-central1-a")),
            "https://www.googleapis.com/compute/v1/projects/myproject/global/firewalls"
        );
    }

    #[test]
    fn test_api_error_envelope() {
        let body = r#"{"error":{"code":409,"message":"The resource 'projects/myproject/global/networks/jclouds-test' already exists","errors":[{"domain":"global","reason":"alreadyExists","message":"exists"}]}}"#;
        let err: gceflow_cloud::CloudError = api_error(StatusCode::CONFLICT, body).into();
        assert!(err.is_already_exists());

        let err: gceflow_cloud::CloudError = api_error(StatusCode::NOT_FOUND, "").into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rejects_empty_token() {
        assert!(GooglePlatform::new(GoogleConfig::new("myproject", "")).is_err());
    }
}
