//! Invoice documents.

use serde::{Deserialize, Serialize};

use docanchor_core::{CoreDocument, IssuerId};
use docanchor_crypto::{DataField, FieldSalts};

use crate::model::{DocumentKind, Model};

/// Business fields of an invoice. Amounts are in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceData {
    pub invoice_number: String,
    pub sender_name: String,
    pub sender_zipcode: String,
    pub sender_country: String,
    pub recipient_name: String,
    pub recipient_zipcode: String,
    pub recipient_country: String,
    pub currency: String,
    pub gross_amount: i64,
    pub net_amount: i64,
    pub tax_amount: i64,
    pub due_date: String,
    /// Identity of the paying party.
    pub recipient: Option<IssuerId>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub core: CoreDocument,
    pub data: InvoiceData,
    #[serde(default)]
    pub salts: FieldSalts,
}

impl Invoice {
    /// A new, unanchored invoice with fresh salts.
    pub fn new(data: InvoiceData) -> Self {
        let mut invoice = Self {
            core: CoreDocument::new(),
            data,
            salts: FieldSalts::new(),
        };
        invoice.fill_salts();
        invoice
    }
}

impl Model for Invoice {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Invoice
    }

    fn core(&self) -> &CoreDocument {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CoreDocument {
        &mut self.core
    }

    fn data_fields(&self) -> Vec<DataField> {
        let d = &self.data;
        vec![
            DataField::new("invoice_number", 1, d.invoice_number.as_bytes()),
            DataField::new("sender_name", 2, d.sender_name.as_bytes()),
            DataField::new("sender_zipcode", 3, d.sender_zipcode.as_bytes()),
            DataField::new("sender_country", 4, d.sender_country.as_bytes()),
            DataField::new("recipient_name", 5, d.recipient_name.as_bytes()),
            DataField::new("recipient_zipcode", 6, d.recipient_zipcode.as_bytes()),
            DataField::new("recipient_country", 7, d.recipient_country.as_bytes()),
            DataField::new("currency", 8, d.currency.as_bytes()),
            DataField::new("gross_amount", 9, d.gross_amount.to_be_bytes()),
            DataField::new("net_amount", 10, d.net_amount.to_be_bytes()),
            DataField::new("tax_amount", 11, d.tax_amount.to_be_bytes()),
            DataField::new("due_date", 12, d.due_date.as_bytes()),
            DataField::new(
                "recipient",
                13,
                d.recipient.map(|r| r.to_vec()).unwrap_or_default(),
            ),
            DataField::new("comment", 14, d.comment.as_bytes()),
        ]
    }

    fn field_salts(&self) -> &FieldSalts {
        &self.salts
    }

    fn field_salts_mut(&mut self) -> &mut FieldSalts {
        &mut self.salts
    }
}
