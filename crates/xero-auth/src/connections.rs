//! Tenant connections
//!
//! Every organisation the user authorised is a "connection". The connection
//! `id` is what gets revoked on disconnect; the `tenantId` is what scopes
//! Accounting API calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One authorised tenant as reported by the connections endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Connection id, used to revoke this tenant's authorisation
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_event_id: Option<String>,
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date_utc: Option<String>,
    /// Organisation details, only populated by a full tenant refresh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_data: Option<Organisation>,
}

impl Tenant {
    /// The organisation's base currency, when organisation details were loaded.
    pub fn base_currency(&self) -> Option<&str> {
        self.org_data.as_ref()?.base_currency.as_deref()
    }
}

/// Subset of the Accounting API `Organisation` resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Organisation {
    #[serde(rename = "OrganisationID", default, skip_serializing_if = "Option::is_none")]
    pub organisation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct Organisations {
    #[serde(rename = "Organisations", default)]
    organisations: Vec<Organisation>,
}

/// List the tenants the access token is authorised for.
pub async fn list_connections(
    client: &reqwest::Client,
    connections_endpoint: &str,
    access_token: &str,
) -> Result<Vec<Tenant>> {
    let response = client
        .get(connections_endpoint)
        .bearer_auth(access_token)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| Error::Http(format!("connections request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Connections(format!(
            "listing connections returned {status}: {body}"
        )));
    }

    response
        .json::<Vec<Tenant>>()
        .await
        .map_err(|e| Error::Connections(format!("invalid connections response: {e}")))
}

/// Revoke a single tenant connection.
pub async fn delete_connection(
    client: &reqwest::Client,
    connections_endpoint: &str,
    access_token: &str,
    connection_id: &str,
) -> Result<()> {
    let url = format!(
        "{}/{}",
        connections_endpoint.trim_end_matches('/'),
        connection_id
    );
    let response = client
        .delete(&url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("disconnect request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Connections(format!(
            "deleting connection {connection_id} returned {status}: {body}"
        )));
    }
    Ok(())
}

/// Fetch the organisation record for a tenant.
pub async fn fetch_organisation(
    client: &reqwest::Client,
    accounting_base: &str,
    access_token: &str,
    tenant_id: &str,
) -> Result<Option<Organisation>> {
    let url = format!("{}/Organisation", accounting_base.trim_end_matches('/'));
    let response = client
        .get(&url)
        .bearer_auth(access_token)
        .header("xero-tenant-id", tenant_id)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| Error::Http(format!("organisation request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Connections(format!(
            "organisation lookup for {tenant_id} returned {status}: {body}"
        )));
    }

    let body = response
        .json::<Organisations>()
        .await
        .map_err(|e| Error::Connections(format!("invalid organisation response: {e}")))?;
    Ok(body.organisations.into_iter().next())
}
