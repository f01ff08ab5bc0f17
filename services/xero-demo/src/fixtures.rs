//! Sample payloads for the demo pipelines
//!
//! Numbers in names and references are randomised so repeated runs against
//! the same organisation do not collide on uniqueness checks.

use rand::RngExt;
use xero_accounting::{
    Contact, Invoice, InvoiceStatus, InvoiceType, LineAmountTypes, LineItem, PurchaseOrder, Quote,
};

/// Account code the platform rejects, used to provoke a validation error
pub const INVALID_ACCOUNT_CODE: &str = "99999999";

/// Delivery instructions written by the purchase order update
pub const DELIVERY_INSTRUCTIONS: &str = "Don't forget the secret knock";

/// Upper bound for randomised numbers in names and references
const RANDOM_RANGE: u32 = 1_000_000;

#[derive(Debug, Default)]
pub struct Fixtures;

impl Fixtures {
    /// Contact for the signed-in user.
    pub fn contact(&self, email: Option<&str>) -> Contact {
        Contact {
            name: Some(format!("Test User: {}", random_number())),
            first_name: Some("Rick".into()),
            last_name: Some("James".into()),
            email_address: email.map(String::from),
            ..Default::default()
        }
    }

    /// Submitted sales invoice with two consulting lines.
    pub fn invoice(
        &self,
        contact_id: &str,
        branding_theme_id: Option<&str>,
        account_code: Option<&str>,
        currency_code: Option<&str>,
    ) -> Invoice {
        let line = |description: &str, quantity: f64, unit_amount: f64| LineItem {
            description: Some(description.into()),
            tax_type: Some("NONE".into()),
            quantity: Some(quantity),
            unit_amount: Some(unit_amount),
            account_code: account_code.map(String::from),
            ..Default::default()
        };

        Invoice {
            invoice_type: Some(InvoiceType::Accrec),
            contact: Some(Contact::reference(contact_id)),
            expected_payment_date: Some("2009-10-20T00:00:00".into()),
            invoice_number: Some(format!("XERO:{}", random_number())),
            reference: Some(format!("REF:{}", random_number())),
            branding_theme_id: branding_theme_id.map(String::from),
            url: Some("https://deeplink-to-your-site.com".into()),
            has_attachments: Some(true),
            currency_code: currency_code.map(String::from),
            status: Some(InvoiceStatus::Submitted),
            line_amount_types: Some(LineAmountTypes::Inclusive),
            sub_total: Some(87.11),
            total_tax: Some(10.89),
            total: Some(98.0),
            date: Some("2009-05-27T00:00:00".into()),
            due_date: Some("2009-06-06T00:00:00".into()),
            line_items: vec![
                line("Consulting services", 20.0, 100.0),
                line("Mega Consulting services", 10.0, 500.0),
            ],
            ..Default::default()
        }
    }

    /// Invoice the platform will reject with a validation error.
    pub fn invalid_invoice(&self, contact_id: &str) -> Invoice {
        Invoice {
            invoice_type: Some(InvoiceType::Accrec),
            contact: Some(Contact::reference(contact_id)),
            status: Some(InvoiceStatus::Submitted),
            date: Some("2009-05-27T00:00:00".into()),
            due_date: Some("2009-06-06T00:00:00".into()),
            line_items: vec![LineItem {
                description: Some("Consulting services".into()),
                tax_type: Some("NONE".into()),
                quantity: Some(20.0),
                unit_amount: Some(100.0),
                account_code: Some(INVALID_ACCOUNT_CODE.into()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    pub fn invoice_reference(&self) -> String {
        format!("NEW-REF:{}", random_number())
    }

    pub fn purchase_order(&self, contact_id: &str) -> PurchaseOrder {
        PurchaseOrder {
            contact: Some(Contact::reference(contact_id)),
            date: Some("2020-02-07".into()),
            delivery_date: Some("2020-02-14".into()),
            line_amount_types: Some(LineAmountTypes::Exclusive),
            line_items: vec![LineItem {
                description: Some("Office Chairs".into()),
                quantity: Some(5.0),
                unit_amount: Some(120.0),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    pub fn quote(&self, contact_id: &str) -> Quote {
        Quote {
            date: Some("2020-02-05".into()),
            quote_number: Some(format!("QuoteNum:{}", random_number())),
            contact: Some(Contact::reference(contact_id)),
            line_items: vec![LineItem {
                description: Some("Consulting services".into()),
                tax_type: Some("OUTPUT".into()),
                quantity: Some(20.0),
                unit_amount: Some(100.0),
                account_code: Some("200".into()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}

fn random_number() -> u32 {
    rand::rng().random_range(1..=RANDOM_RANGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_lines_share_the_selected_account() {
        let invoice = Fixtures.invoice("c-1", Some("bt-1"), Some("429"), Some("NZD"));
        assert_eq!(invoice.line_items.len(), 2);
        assert!(
            invoice
                .line_items
                .iter()
                .all(|l| l.account_code.as_deref() == Some("429"))
        );
        assert_eq!(invoice.currency_code.as_deref(), Some("NZD"));
        assert_eq!(invoice.branding_theme_id.as_deref(), Some("bt-1"));
        assert!(invoice.invoice_number.unwrap().starts_with("XERO:"));
    }

    #[test]
    fn invalid_invoice_uses_rejected_account_code() {
        let invoice = Fixtures.invalid_invoice("c-1");
        assert_eq!(
            invoice.line_items[0].account_code.as_deref(),
            Some(INVALID_ACCOUNT_CODE)
        );
    }

    #[test]
    fn random_numbers_stay_in_range() {
        for _ in 0..1000 {
            let n = random_number();
            assert!((1..=RANDOM_RANGE).contains(&n));
        }
    }

    #[test]
    fn contact_carries_session_email() {
        let contact = Fixtures.contact(Some("rick@example.com"));
        assert_eq!(contact.email_address.as_deref(), Some("rick@example.com"));
        assert!(contact.name.unwrap().starts_with("Test User: "));
        assert!(contact.contact_id.is_none());
    }
}
