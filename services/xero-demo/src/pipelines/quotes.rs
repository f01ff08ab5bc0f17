//! Quote pipeline

use std::path::Path;

use serde::Serialize;
use tracing::info;
use xero_accounting::Attachment;

use super::attachment::AttachmentFile;
use super::{TenantContext, first_contact_id, log_validation_errors};
use crate::error::ApiError;
use crate::fixtures::Fixtures;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotesOutcome {
    /// Quotes that existed before this run
    pub count: usize,
    pub get_one_quote_number: Option<String>,
    pub created_quotes_id: String,
    pub add_quote_attachment: Vec<Attachment>,
}

pub async fn run(
    ctx: &TenantContext,
    fixtures: &Fixtures,
    attachment_path: &Path,
) -> Result<QuotesOutcome, ApiError> {
    let api = &ctx.api;
    let existing = api.get_quotes().await?;
    let count = existing.len();
    let contact_id = first_contact_id(api).await?;

    let created = api
        .update_or_create_quotes(&[fixtures.quote(&contact_id)], true)
        .await?;
    log_validation_errors("updateOrCreateQuotes", &created);
    let created_quotes_id = created
        .into_iter()
        .find_map(|q| q.quote_id)
        .ok_or_else(|| xero_accounting::Error::Empty("quote creation returned no id".into()))?;

    let file = AttachmentFile::read(attachment_path).await?;
    let add_quote_attachment = api
        .create_quote_attachment_by_file_name(
            &created_quotes_id,
            &file.file_name,
            file.content,
            file.content_type,
        )
        .await?;

    // Read back the first quote that existed before this run, or the new one
    let one_id = existing
        .into_iter()
        .find_map(|q| q.quote_id)
        .unwrap_or_else(|| created_quotes_id.clone());
    let one = api.get_quote(&one_id).await?;

    info!(quote_id = %created_quotes_id, count, "quote pipeline finished");
    Ok(QuotesOutcome {
        count,
        get_one_quote_number: one.quote_number,
        created_quotes_id,
        add_quote_attachment,
    })
}
