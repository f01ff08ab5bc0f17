//! Tenant-scoped Accounting API client
//!
//! An [`AccountingApi`] is cheap to build: it borrows the pooled HTTP client
//! and carries one access token and one tenant id. Reads are `GET`, creates
//! are `PUT`, updates and update-or-create are `POST`, matching the
//! platform's verb conventions.

use common::Secret;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::models::{
    Account, Accounts, Attachment, Attachments, BrandingTheme, BrandingThemes, Contact, Contacts,
    Invoice, InvoiceStatus, Invoices, PurchaseOrder, PurchaseOrders, Quote, Quotes,
};

const TENANT_HEADER: &str = "xero-tenant-id";

/// Accounting API client bound to one access token and one tenant.
#[derive(Debug, Clone)]
pub struct AccountingApi {
    http: reqwest::Client,
    base_url: Url,
    access_token: Secret<String>,
    tenant_id: String,
}

impl AccountingApi {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        access_token: &str,
        tenant_id: impl Into<String>,
    ) -> Result<Self> {
        let parsed = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| Error::Http(format!("invalid accounting base URL {base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(Error::Http(format!(
                "accounting base URL {base_url} cannot carry a path"
            )));
        }
        Ok(Self {
            http,
            base_url: parsed,
            access_token: Secret::from(access_token),
            tenant_id: tenant_id.into(),
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    // -- Branding themes, contacts, accounts -------------------------------

    pub async fn get_branding_themes(&self) -> Result<Vec<BrandingTheme>> {
        let url = self.url(&["BrandingThemes"]);
        let body: BrandingThemes = self
            .send("getBrandingThemes", self.request(Method::GET, url))
            .await?;
        Ok(body.branding_themes)
    }

    pub async fn create_contacts(
        &self,
        contacts: &[Contact],
        summarize_errors: bool,
    ) -> Result<Vec<Contact>> {
        let url = self.url(&["Contacts"]);
        let request = self
            .request(Method::PUT, url)
            .query(&[("summarizeErrors", summarize_errors)])
            .json(&json!({ "Contacts": contacts }));
        let body: Contacts = self.send("createContacts", request).await?;
        Ok(body.contacts)
    }

    pub async fn get_contacts(&self) -> Result<Vec<Contact>> {
        let url = self.url(&["Contacts"]);
        let body: Contacts = self
            .send("getContacts", self.request(Method::GET, url))
            .await?;
        Ok(body.contacts)
    }

    /// List accounts, optionally narrowed by a `where` filter expression.
    pub async fn get_accounts(&self, where_clause: Option<&str>) -> Result<Vec<Account>> {
        let url = self.url(&["Accounts"]);
        let mut request = self.request(Method::GET, url);
        if let Some(filter) = where_clause {
            request = request.query(&[("where", filter)]);
        }
        let body: Accounts = self.send("getAccounts", request).await?;
        Ok(body.accounts)
    }

    // -- Invoices ------------------------------------------------------------

    /// Create invoices. With `summarize_errors = false` the platform answers
    /// 200 and reports failures per invoice in `ValidationErrors`.
    pub async fn create_invoices(
        &self,
        invoices: &[Invoice],
        summarize_errors: bool,
    ) -> Result<Vec<Invoice>> {
        let url = self.url(&["Invoices"]);
        let request = self
            .request(Method::PUT, url)
            .query(&[("summarizeErrors", summarize_errors)])
            .json(&json!({ "Invoices": invoices }));
        let body: Invoices = self.send("createInvoices", request).await?;
        Ok(body.invoices)
    }

    pub async fn update_or_create_invoices(
        &self,
        invoices: &[Invoice],
        summarize_errors: bool,
    ) -> Result<Vec<Invoice>> {
        let url = self.url(&["Invoices"]);
        let request = self
            .request(Method::POST, url)
            .query(&[("summarizeErrors", summarize_errors)])
            .json(&json!({ "Invoices": invoices }));
        let body: Invoices = self.send("updateOrCreateInvoices", request).await?;
        Ok(body.invoices)
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice> {
        let url = self.url(&["Invoices", invoice_id]);
        let body: Invoices = self
            .send("getInvoice", self.request(Method::GET, url))
            .await?;
        first(body.invoices, || format!("invoice {invoice_id} not found"))
    }

    pub async fn update_invoice(&self, invoice_id: &str, invoice: &Invoice) -> Result<Invoice> {
        let url = self.url(&["Invoices", invoice_id]);
        let request = self
            .request(Method::POST, url)
            .json(&json!({ "Invoices": [invoice] }));
        let body: Invoices = self.send("updateInvoice", request).await?;
        first(body.invoices, || format!("update of invoice {invoice_id} returned no invoice"))
    }

    /// List invoices, restricted to `statuses` when any are given.
    pub async fn get_invoices(&self, statuses: &[InvoiceStatus]) -> Result<Vec<Invoice>> {
        let url = self.url(&["Invoices"]);
        let mut request = self.request(Method::GET, url);
        if !statuses.is_empty() {
            let joined = statuses
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",");
            request = request.query(&[("Statuses", joined)]);
        }
        let body: Invoices = self.send("getInvoices", request).await?;
        Ok(body.invoices)
    }

    pub async fn create_invoice_attachment_by_file_name(
        &self,
        invoice_id: &str,
        file_name: &str,
        content: Vec<u8>,
        content_type: &str,
        include_online: bool,
    ) -> Result<Vec<Attachment>> {
        let url = self.url(&["Invoices", invoice_id, "Attachments", file_name]);
        let request = self
            .request(Method::PUT, url)
            .query(&[("IncludeOnline", include_online)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(content);
        let body: Attachments = self
            .send("createInvoiceAttachmentByFileName", request)
            .await?;
        Ok(body.attachments)
    }

    // -- Purchase orders -----------------------------------------------------

    pub async fn get_purchase_orders(&self) -> Result<Vec<PurchaseOrder>> {
        let url = self.url(&["PurchaseOrders"]);
        let body: PurchaseOrders = self
            .send("getPurchaseOrders", self.request(Method::GET, url))
            .await?;
        Ok(body.purchase_orders)
    }

    pub async fn create_purchase_orders(
        &self,
        orders: &[PurchaseOrder],
        summarize_errors: bool,
    ) -> Result<Vec<PurchaseOrder>> {
        let url = self.url(&["PurchaseOrders"]);
        let request = self
            .request(Method::PUT, url)
            .query(&[("summarizeErrors", summarize_errors)])
            .json(&json!({ "PurchaseOrders": orders }));
        let body: PurchaseOrders = self.send("createPurchaseOrders", request).await?;
        Ok(body.purchase_orders)
    }

    pub async fn get_purchase_order(&self, purchase_order_id: &str) -> Result<PurchaseOrder> {
        let url = self.url(&["PurchaseOrders", purchase_order_id]);
        let body: PurchaseOrders = self
            .send("getPurchaseOrder", self.request(Method::GET, url))
            .await?;
        first(body.purchase_orders, || {
            format!("purchase order {purchase_order_id} not found")
        })
    }

    pub async fn update_purchase_order(
        &self,
        purchase_order_id: &str,
        order: &PurchaseOrder,
    ) -> Result<PurchaseOrder> {
        let url = self.url(&["PurchaseOrders", purchase_order_id]);
        let request = self
            .request(Method::POST, url)
            .json(&json!({ "PurchaseOrders": [order] }));
        let body: PurchaseOrders = self.send("updatePurchaseOrder", request).await?;
        first(body.purchase_orders, || {
            format!("update of purchase order {purchase_order_id} returned no purchase order")
        })
    }

    // -- Quotes --------------------------------------------------------------

    pub async fn get_quotes(&self) -> Result<Vec<Quote>> {
        let url = self.url(&["Quotes"]);
        let body: Quotes = self
            .send("getQuotes", self.request(Method::GET, url))
            .await?;
        Ok(body.quotes)
    }

    pub async fn update_or_create_quotes(
        &self,
        quotes: &[Quote],
        summarize_errors: bool,
    ) -> Result<Vec<Quote>> {
        let url = self.url(&["Quotes"]);
        let request = self
            .request(Method::POST, url)
            .query(&[("summarizeErrors", summarize_errors)])
            .json(&json!({ "Quotes": quotes }));
        let body: Quotes = self.send("updateOrCreateQuotes", request).await?;
        Ok(body.quotes)
    }

    pub async fn get_quote(&self, quote_id: &str) -> Result<Quote> {
        let url = self.url(&["Quotes", quote_id]);
        let body: Quotes = self
            .send("getQuote", self.request(Method::GET, url))
            .await?;
        first(body.quotes, || format!("quote {quote_id} not found"))
    }

    pub async fn create_quote_attachment_by_file_name(
        &self,
        quote_id: &str,
        file_name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<Vec<Attachment>> {
        let url = self.url(&["Quotes", quote_id, "Attachments", file_name]);
        let request = self
            .request(Method::PUT, url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(content);
        let body: Attachments = self
            .send("createQuoteAttachmentByFileName", request)
            .await?;
        Ok(body.attachments)
    }

    // -- Transport -----------------------------------------------------------

    /// Base URL extended with percent-encoded path segments.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL can carry a path
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(self.access_token.expose())
            .header(TENANT_HEADER, self.tenant_id.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("{operation} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        debug!(operation, tenant_id = %self.tenant_id, "accounting call succeeded");
        response.json::<T>().await.map_err(|e| Error::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

fn first<T>(items: Vec<T>, describe: impl FnOnce() -> String) -> Result<T> {
    items.into_iter().next().ok_or_else(|| Error::Empty(describe()))
}
