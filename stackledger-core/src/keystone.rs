//! Keystone v3 password session
//!
//! Handles:
//! - Password authentication with project scope
//! - Service catalog lookup by type, interface and region
//! - Authenticated JSON GETs against catalog endpoints

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::env::OsCredentials;
use crate::error::{LedgerError, Result};

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

/// Authenticated session shared by every OpenStack client of a run
#[derive(Clone)]
pub struct KeystoneSession {
    client: reqwest::Client,
    token: String,
    catalog: Vec<CatalogEntry>,
    interface: String,
    region: Option<String>,
}

impl KeystoneSession {
    /// Authenticate with the password method, scoped to the configured project
    pub async fn authenticate(creds: &OsCredentials) -> Result<Self> {
        if !creds.identity_api_version.starts_with('3') {
            return Err(LedgerError::Config(format!(
                "unsupported OS_IDENTITY_API_VERSION '{}', only v3 is supported",
                creds.identity_api_version
            )));
        }

        let url = format!("{}/auth/tokens", creds.identity_v3_url());
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": creds.username,
                            "domain": { "name": creds.user_domain_name },
                            "password": creds.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": creds.project_name,
                        "domain": { "name": creds.project_domain_name },
                    }
                }
            }
        });

        debug!("Authenticating {} against {}", creds.username, url);

        let client = reqwest::Client::new();
        let response = client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LedgerError::Auth(format!("{}: {}", status, message)));
        }

        let token = subject_token(response.headers())?;
        let body: TokenResponse = response.json().await?;

        info!(
            "Authenticated as {} (project {}), {} catalog entries",
            creds.username,
            creds.project_name,
            body.token.catalog.len()
        );

        Ok(Self::from_parts(
            client,
            token,
            body.token.catalog,
            &creds.interface,
            creds.region_name.clone(),
        ))
    }

    pub fn from_parts(
        client: reqwest::Client,
        token: String,
        catalog: Vec<CatalogEntry>,
        interface: &str,
        region: Option<String>,
    ) -> Self {
        Self {
            client,
            token,
            catalog,
            interface: interface.to_string(),
            region,
        }
    }

    /// Endpoint URL for a service type on the session's interface and region
    pub fn endpoint(&self, service_type: &str) -> Result<String> {
        find_endpoint(&self.catalog, service_type, &self.interface, self.region.as_deref())
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| LedgerError::Catalog {
                service: service_type.to_string(),
                interface: self.interface.clone(),
            })
    }

    /// Authenticated GET returning a JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, &str)],
    ) -> Result<T> {
        let mut request = self
            .client
            .get(url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        debug!("GET {}", url);
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LedgerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

fn subject_token(headers: &HeaderMap) -> Result<String> {
    headers
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| LedgerError::Auth("response carried no X-Subject-Token".into()))
}

fn find_endpoint<'a>(
    catalog: &'a [CatalogEntry],
    service_type: &str,
    interface: &str,
    region: Option<&str>,
) -> Option<&'a str> {
    // Interfaces may be given as "public" or "publicURL"
    let interface = interface.trim_end_matches("URL");

    catalog
        .iter()
        .filter(|entry| entry.service_type == service_type)
        .flat_map(|entry| entry.endpoints.iter())
        .filter(|ep| ep.interface == interface)
        .find(|ep| match region {
            Some(r) => ep.region.as_deref() == Some(r) || ep.region_id.as_deref() == Some(r),
            None => true,
        })
        .map(|ep| ep.url.as_str())
}
