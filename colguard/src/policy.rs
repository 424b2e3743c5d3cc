//! Tenant policy client: list, add and remove server policies.
//!
//! Policy documents live on disk as `<dir>/policy.<name>.json` and are
//! posted unchanged.

use crate::config::Settings;
use crate::error::Error;
use crate::http::{ApiEndpoint, HttpMethod, HttpPorter, HttpResponse};
use crate::report::Report;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const POLICIES_PATH: &str = "/policies";

/// One entry of the tenant policy list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicySummary {
    pub id: String,
    #[serde(rename = "policyId", default)]
    pub policy_id: String,
}

/// Answer of the policy list call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyList {
    #[serde(rename = "totalResults", default)]
    pub total_results: u64,
    #[serde(rename = "Resources", default)]
    pub resources: Vec<PolicySummary>,
}

/// Path of the document for the policy called `name`.
#[must_use]
pub fn policy_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("policy.{name}.json"))
}

fn expect_status(response: &HttpResponse, expected: i32) -> Result<(), Error> {
    if response.status_code == expected {
        Ok(())
    } else {
        Err(Error::Request { status: response.status_code, message: response.error_message() })
    }
}

#[derive(Debug, Clone)]
pub struct PolicyClient {
    porter: HttpPorter,
    endpoint: ApiEndpoint,
}

impl PolicyClient {
    #[must_use]
    pub const fn new(porter: HttpPorter, endpoint: ApiEndpoint) -> Self {
        Self { porter, endpoint }
    }

    /// # Errors
    ///
    /// Returns an error if the API URL, tenant id or credentials are unset.
    pub fn from_settings(porter: &HttpPorter, settings: &Settings) -> Result<Self, Error> {
        Ok(Self::new(porter.clone(), ApiEndpoint::from_settings(&settings.api)?))
    }

    async fn send(&self, method: HttpMethod, path: &str, body: Option<&str>) -> HttpResponse {
        let url = self.endpoint.url(path);
        self.porter.send(method, &url, Some(self.endpoint.authorization()), body).await
    }

    /// Lists the tenant's policies. Expects `200 OK`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Request` for any other status and `Error::Json` if the
    /// list cannot be decoded.
    pub async fn list(&self) -> Result<PolicyList, Error> {
        let response = self.send(HttpMethod::Get, POLICIES_PATH, None).await;
        expect_status(&response, 200)?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// Posts a policy document. Expects `201 Created` and returns the new id.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `document` is not JSON, `Error::Request` for
    /// an unexpected status or an answer without an id.
    pub async fn add(&self, document: &str) -> Result<String, Error> {
        serde_json::from_str::<Value>(document)?;
        let response = self.send(HttpMethod::Post, POLICIES_PATH, Some(document)).await;
        expect_status(&response, 201)?;
        response.body.get("id").and_then(Value::as_str).map(str::to_string).ok_or_else(|| {
            Error::Request { status: response.status_code, message: "response carries no id".to_string() }
        })
    }

    /// Reads `<dir>/policy.<name>.json` and posts it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the document cannot be read, otherwise as
    /// [`PolicyClient::add`].
    pub async fn add_named(&self, dir: &Path, name: &str) -> Result<String, Error> {
        let path = policy_file(dir, name);
        debug!("applying policy {}", path.display());
        let document = tokio::fs::read_to_string(&path).await?;
        self.add(&document).await
    }

    /// Deletes a policy. Expects `204 No Content`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Request` for any other status.
    pub async fn remove(&self, policy_id: &str) -> Result<(), Error> {
        let response = self.send(HttpMethod::Delete, &format!("{POLICIES_PATH}/{policy_id}"), None).await;
        expect_status(&response, 204)
    }
}

pub async fn list_policies(porter: &HttpPorter, settings: &Settings) -> Report {
    const OPERATION: &str = "List Policies";
    let result = match PolicyClient::from_settings(porter, settings) {
        Ok(client) => client.list().await,
        Err(e) => Err(e),
    };
    match result {
        Ok(list) => {
            println!("\t{} Policies:", list.total_results);
            println!("\tPolicy Id                : Policy");
            for policy in &list.resources {
                println!("\t{} : {}", policy.id, policy.policy_id);
            }
            Report::succeeded(OPERATION, format!("{} policies", list.total_results))
        }
        Err(e) => {
            let status = format!("ERROR: Failure to obtain policy list. {e}");
            error!("{status}");
            Report::failed(OPERATION, status)
        }
    }
}

pub async fn add_policy(porter: &HttpPorter, settings: &Settings, name: &str) -> Report {
    const OPERATION: &str = "Add Policy";
    let result = match PolicyClient::from_settings(porter, settings) {
        Ok(client) => client.add_named(&settings.policy.dir, name).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(id) => {
            info!("Policy: {id} has been added to tenant.");
            Report::succeeded(OPERATION, format!("Policy: {id} has been added to tenant."))
        }
        Err(e) => {
            let status = format!("ERROR: Failure to apply policy. {e}");
            error!("{status}");
            Report::failed(OPERATION, status)
        }
    }
}

pub async fn remove_policy(porter: &HttpPorter, settings: &Settings, policy_id: &str) -> Report {
    const OPERATION: &str = "Remove Policy";
    let result = match PolicyClient::from_settings(porter, settings) {
        Ok(client) => client.remove(policy_id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            info!("Policy {policy_id} removed from tenant.");
            Report::succeeded(OPERATION, format!("Policy {policy_id} removed from tenant."))
        }
        Err(e) => {
            let status = format!("ERROR: Failure to remove policy {policy_id} from tenant. {e}");
            error!("{status}");
            Report::failed(OPERATION, status)
        }
    }
}
