//! Invoice pipeline
//!
//! Branding themes, a contact for the signed-in user, expense accounts, two
//! invoice creations (one batch deliberately carrying an invalid account
//! code), a read-back, a reference update and a final count.

use serde::Serialize;
use tracing::info;
use xero_accounting::{ACCOUNT_STATUS_ACTIVE, ACCOUNT_TYPE_EXPENSE, Invoice, accounts_where};

use super::{TenantContext, log_validation_errors};
use crate::error::ApiError;
use crate::fixtures::Fixtures;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicesOutcome {
    pub invoice_id: String,
    pub email: Option<String>,
    pub created_invoice: Invoice,
    pub updated_invoice: Invoice,
    pub count: usize,
}

pub async fn run(ctx: &TenantContext, fixtures: &Fixtures) -> Result<InvoicesOutcome, ApiError> {
    let api = &ctx.api;
    let email = ctx.email.as_deref();

    let themes = api.get_branding_themes().await?;
    let branding_theme_id = themes.into_iter().find_map(|t| t.branding_theme_id);

    let created_contacts = api.create_contacts(&[fixtures.contact(email)], false).await?;
    log_validation_errors("createContacts", &created_contacts);

    let contacts = api.get_contacts().await?;
    let contact_id = contacts
        .into_iter()
        .filter(|c| email.is_some() && c.email_address.as_deref() == email)
        .find_map(|c| c.contact_id)
        .ok_or_else(|| {
            xero_accounting::Error::Empty("no contact matches the signed-in user's email".into())
        })?;

    let accounts = api
        .get_accounts(Some(&accounts_where(ACCOUNT_STATUS_ACTIVE, ACCOUNT_TYPE_EXPENSE)))
        .await?;
    let account_code = accounts.into_iter().find_map(|a| a.code);

    let invoice = fixtures.invoice(
        &contact_id,
        branding_theme_id.as_deref(),
        account_code.as_deref(),
        ctx.tenant.base_currency(),
    );

    // summarizeErrors=false: failures come back per invoice with a 200
    let created = api
        .create_invoices(&[invoice.clone(), invoice.clone()], false)
        .await?;
    log_validation_errors("createInvoices", &created);

    let mixed = api
        .update_or_create_invoices(&[invoice.clone(), fixtures.invalid_invoice(&contact_id)], false)
        .await?;
    log_validation_errors("updateOrCreateInvoices", &mixed);

    let created_invoice = created
        .into_iter()
        .next()
        .ok_or_else(|| xero_accounting::Error::Empty("invoice creation returned nothing".into()))?;
    let created_id = created_invoice.invoice_id.clone().ok_or_else(|| {
        xero_accounting::Error::Empty("first created invoice has no InvoiceID".into())
    })?;

    let fetched = api.get_invoice(&created_id).await?;
    let invoice_id = fetched.invoice_id.unwrap_or(created_id);

    let update = Invoice {
        reference: Some(fixtures.invoice_reference()),
        ..invoice
    };
    let updated_invoice = api.update_invoice(&invoice_id, &update).await?;

    let count = api.get_invoices(&[]).await?.len();
    info!(invoice_id = %invoice_id, count, "invoice pipeline finished");

    Ok(InvoicesOutcome {
        invoice_id,
        email: ctx.email.clone(),
        created_invoice,
        updated_invoice,
        count,
    })
}
