//! VM and service performance profiles
//!
//! Profiles come from the performance-profiling service over HTTP:
//! `GET {endpoint}/api/vms` returns the VM catalog and
//! `GET {endpoint}/api/services/{name}` the profile of one service.

use crate::catalog::VmCatalog;
use crate::models::{ServiceProfile, VmProfile};
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn vm_profiles(&self) -> Result<Vec<VmProfile>>;

    async fn service_profile(&self, service_name: &str) -> Result<ServiceProfile>;

    /// Fetch the VM profiles and index them by type
    async fn catalog(&self) -> Result<VmCatalog> {
        Ok(VmCatalog::new(self.vm_profiles().await?))
    }
}

/// Parse `base` so that relative joins append to its path
pub fn base_url(base: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid endpoint URL: {}", base))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Profile source backed by the profiling service
pub struct HttpProfileSource {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpProfileSource {
    pub fn new(endpoint: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url(endpoint)?,
            retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.base_url.as_str()
    }

    /// Endpoint URL with `segments` appended, each one percent-encoded
    fn url_for(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Endpoint URL cannot have a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.url_for(segments)?;
        let operation = format!("GET {}", url);
        let url = &url;
        self.retry
            .run(&operation, || async move {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .context("Failed to send request")?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    anyhow::bail!("Profiling service error ({}): {}", status, body);
                }

                response
                    .json::<T>()
                    .await
                    .context("Failed to parse response")
            })
            .await
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn vm_profiles(&self) -> Result<Vec<VmProfile>> {
        let profiles: Vec<VmProfile> = self.get(&["api", "vms"]).await?;
        debug!(count = profiles.len(), "Fetched VM profiles");
        Ok(profiles)
    }

    async fn service_profile(&self, service_name: &str) -> Result<ServiceProfile> {
        self.get(&["api", "services", service_name]).await
    }
}

/// Fixed profiles, used for local evaluation and tests
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles {
    vms: Vec<VmProfile>,
    services: HashMap<String, ServiceProfile>,
}

impl StaticProfiles {
    pub fn new(vms: Vec<VmProfile>, services: Vec<ServiceProfile>) -> Self {
        Self {
            vms,
            services: services
                .into_iter()
                .map(|s| (s.service_name.clone(), s))
                .collect(),
        }
    }
}

#[async_trait]
impl ProfileSource for StaticProfiles {
    async fn vm_profiles(&self) -> Result<Vec<VmProfile>> {
        Ok(self.vms.clone())
    }

    async fn service_profile(&self, service_name: &str) -> Result<ServiceProfile> {
        self.services
            .get(service_name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No profile for service {}", service_name))
    }
}
