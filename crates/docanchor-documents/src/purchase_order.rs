//! Purchase order documents.

use serde::{Deserialize, Serialize};

use docanchor_core::{CoreDocument, IssuerId};
use docanchor_crypto::{DataField, FieldSalts};

use crate::model::{DocumentKind, Model};

/// Business fields of a purchase order. Amounts are in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchaseOrderData {
    pub po_number: String,
    pub order_name: String,
    pub order_zipcode: String,
    pub order_country: String,
    pub recipient_name: String,
    pub recipient_zipcode: String,
    pub recipient_country: String,
    pub currency: String,
    pub order_amount: i64,
    pub delivery_date: String,
    pub recipient: Option<IssuerId>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub core: CoreDocument,
    pub data: PurchaseOrderData,
    #[serde(default)]
    pub salts: FieldSalts,
}

impl PurchaseOrder {
    pub fn new(data: PurchaseOrderData) -> Self {
        let mut order = Self {
            core: CoreDocument::new(),
            data,
            salts: FieldSalts::new(),
        };
        order.fill_salts();
        order
    }
}

impl Model for PurchaseOrder {
    fn kind(&self) -> DocumentKind {
        DocumentKind::PurchaseOrder
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
            DataField::new("po_number", 1, d.po_number.as_bytes()),
            DataField::new("order_name", 2, d.order_name.as_bytes()),
            DataField::new("order_zipcode", 3, d.order_zipcode.as_bytes()),
            DataField::new("order_country", 4, d.order_country.as_bytes()),
            DataField::new("recipient_name", 5, d.recipient_name.as_bytes()),
            DataField::new("recipient_zipcode", 6, d.recipient_zipcode.as_bytes()),
            DataField::new("recipient_country", 7, d.recipient_country.as_bytes()),
            DataField::new("currency", 8, d.currency.as_bytes()),
            DataField::new("order_amount", 9, d.order_amount.to_be_bytes()),
            DataField::new("delivery_date", 10, d.delivery_date.as_bytes()),
            DataField::new(
                "recipient",
                11,
                d.recipient.map(|r| r.to_vec()).unwrap_or_default(),
            ),
            DataField::new("comment", 12, d.comment.as_bytes()),
        ]
    }

    fn field_salts(&self) -> &FieldSalts {
        &self.salts
    }

    fn field_salts_mut(&mut self) -> &mut FieldSalts {
        &mut self.salts
    }
}
