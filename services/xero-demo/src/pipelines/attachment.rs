//! Invoice attachment pipeline and local attachment files

use std::path::Path;

use serde::Serialize;
use tracing::info;
use xero_accounting::{Attachment, InvoiceStatus};

use super::TenantContext;
use crate::error::ApiError;

/// A local file ready to upload.
#[derive(Debug)]
pub struct AttachmentFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub content: Vec<u8>,
}

impl AttachmentFile {
    pub async fn read(path: &Path) -> Result<Self, ApiError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::Attachment(format!("{} has no file name", path.display())))?
            .to_string();
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Attachment(format!("reading {}: {e}", path.display())))?;
        Ok(Self {
            content_type: content_type_for(&file_name),
            file_name,
            content,
        })
    }
}

/// MIME type from the file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Serialize)]
pub struct AttachmentOutcome {
    pub attachments: Vec<Attachment>,
}

/// Attach the configured file to the first paid invoice.
pub async fn run(ctx: &TenantContext, attachment_path: &Path) -> Result<AttachmentOutcome, ApiError> {
    let paid = ctx.api.get_invoices(&[InvoiceStatus::Paid]).await?;
    let invoice_id = paid
        .into_iter()
        .find_map(|i| i.invoice_id)
        .ok_or_else(|| xero_accounting::Error::Empty("no paid invoices to attach to".into()))?;

    let file = AttachmentFile::read(attachment_path).await?;
    let attachments = ctx
        .api
        .create_invoice_attachment_by_file_name(
            &invoice_id,
            &file.file_name,
            file.content,
            file.content_type,
            true,
        )
        .await?;

    info!(invoice_id = %invoice_id, file_name = %file.file_name, "attachment uploaded");
    Ok(AttachmentOutcome { attachments })
}
