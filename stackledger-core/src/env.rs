//! OpenStack credentials sourced from the `OS_*` environment variables

use crate::error::{LedgerError, Result};

/// Credentials and endpoint selection shared by both collectors.
#[derive(Clone)]
pub struct OsCredentials {
    pub username: String,
    pub password: String,
    pub auth_url: String,
    pub project_name: String,
    pub region_name: Option<String>,
    pub project_domain_name: String,
    pub user_domain_name: String,
    pub identity_api_version: String,
    pub interface: String,
}

impl std::fmt::Debug for OsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("project_name", &self.project_name)
            .field("region_name", &self.region_name)
            .field("project_domain_name", &self.project_domain_name)
            .field("user_domain_name", &self.user_domain_name)
            .field("identity_api_version", &self.identity_api_version)
            .field("interface", &self.interface)
            .finish()
    }
}

impl OsCredentials {
    /// Read credentials from the process environment, loading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(LedgerError::MissingEnv(key))
        };

        Ok(OsCredentials {
            username: required("OS_USERNAME")?,
            password: required("OS_PASSWORD")?,
            auth_url: required("OS_AUTH_URL")?,
            project_name: required("OS_PROJECT_NAME")?,
            region_name: lookup("OS_REGION_NAME").filter(|v| !v.is_empty()),
            project_domain_name: required("OS_PROJECT_DOMAIN_NAME")?,
            user_domain_name: required("OS_USER_DOMAIN_NAME")?,
            identity_api_version: lookup("OS_IDENTITY_API_VERSION").unwrap_or_else(|| "3".into()),
            interface: lookup("OS_INTERFACE").unwrap_or_else(|| "public".into()),
        })
    }

    /// Keystone v3 base URL, appending `/v3` when the auth URL is unversioned
    pub fn identity_v3_url(&self) -> String {
        let base = self.auth_url.trim_end_matches('/');
        if base.ends_with("/v3") {
            base.to_string()
        } else {
            format!("{}/v3", base)
        }
    }
}
