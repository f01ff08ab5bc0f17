//! Purchase order pipeline

use serde::Serialize;
use tracing::info;
use xero_accounting::PurchaseOrder;

use super::{TenantContext, first_contact_id, log_validation_errors};
use crate::error::ApiError;
use crate::fixtures::{DELIVERY_INSTRUCTIONS, Fixtures};

#[derive(Debug, Serialize)]
pub struct PurchaseOrdersOutcome {
    /// Purchase orders that existed before this run
    pub count: usize,
    /// Id of the created purchase order
    pub create: String,
    /// First line item description of the created order, read back
    pub get: Option<String>,
    /// Delivery instructions after the update
    pub update: Option<String>,
}

pub async fn run(
    ctx: &TenantContext,
    fixtures: &Fixtures,
) -> Result<PurchaseOrdersOutcome, ApiError> {
    let api = &ctx.api;
    let count = api.get_purchase_orders().await?.len();
    let contact_id = first_contact_id(api).await?;

    let created = api
        .create_purchase_orders(&[fixtures.purchase_order(&contact_id)], true)
        .await?;
    log_validation_errors("createPurchaseOrders", &created);
    let create = created
        .into_iter()
        .find_map(|po| po.purchase_order_id)
        .ok_or_else(|| {
            xero_accounting::Error::Empty("purchase order creation returned no id".into())
        })?;

    let fetched = api.get_purchase_order(&create).await?;
    let get = fetched
        .line_items
        .into_iter()
        .next()
        .and_then(|l| l.description);

    let update = PurchaseOrder {
        delivery_instructions: Some(DELIVERY_INSTRUCTIONS.into()),
        ..Default::default()
    };
    let updated = api.update_purchase_order(&create, &update).await?;

    info!(purchase_order_id = %create, count, "purchase order pipeline finished");
    Ok(PurchaseOrdersOutcome {
        count,
        create,
        get,
        update: updated.delivery_instructions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockXero, context_for};

    #[tokio::test]
    async fn creates_reads_and_updates_purchase_order() {
        let mock = MockXero::start(vec![]).await;
        let outcome = run(&context_for(&mock), &Fixtures).await.unwrap();

        assert_eq!(outcome.count, 0);
        assert_eq!(outcome.get.as_deref(), Some("Office Chairs"));
        assert_eq!(outcome.update.as_deref(), Some(DELIVERY_INSTRUCTIONS));

        let state = mock.state.lock().unwrap();
        assert_eq!(state.purchase_orders.len(), 1);
        assert_eq!(state.purchase_orders[0]["PurchaseOrderID"], outcome.create.as_str());
        assert_eq!(
            state.purchase_orders[0]["Contact"]["ContactID"],
            state.contacts[0]["ContactID"]
        );
    }

    #[tokio::test]
    async fn count_reflects_existing_orders() {
        let mock = MockXero::start(vec![]).await;
        let ctx = context_for(&mock);
        run(&ctx, &Fixtures).await.unwrap();
        let second = run(&ctx, &Fixtures).await.unwrap();
        assert_eq!(second.count, 1);
    }

    #[tokio::test]
    async fn organisation_without_contacts_is_remote_failure() {
        let mock = MockXero::start(vec![]).await;
        mock.state.lock().unwrap().contacts.clear();
        let err = run(&context_for(&mock), &Fixtures).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::RemoteCallFailed(xero_accounting::Error::Empty(_))
        ));
    }
}
