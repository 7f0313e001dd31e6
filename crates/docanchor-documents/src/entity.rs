//! Entity and entity-relationship documents.
//!
//! An entity describes a party (legal name, addresses, payment methods,
//! contacts). An entity relationship grants another identity access to
//! an entity document until an optional block height.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docanchor_core::{CoreDocument, Identifier, IssuerId};
use docanchor_crypto::{DataField, FieldSalts};

use crate::model::{DocumentKind, Model};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub main: bool,
    pub label: String,
    pub address_line1: String,
    pub address_line2: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentMethod {
    pub predetermined: bool,
    pub holder_name: String,
    pub bank_key: String,
    pub bank_account_number: String,
    pub currency: String,
    /// Ledger address for on-chain settlement.
    pub ledger_address: String,
    pub address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityData {
    pub identity: Option<IssuerId>,
    pub legal_name: String,
    pub addresses: Vec<Address>,
    pub payment_methods: Vec<PaymentMethod>,
    pub contacts: Vec<Contact>,
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub core: CoreDocument,
    pub data: EntityData,
    #[serde(default)]
    pub salts: FieldSalts,
}

impl Entity {
    pub fn new(data: EntityData) -> Self {
        let mut entity = Self {
            core: CoreDocument::new(),
            data,
            salts: FieldSalts::new(),
        };
        entity.fill_salts();
        entity
    }
}

// Collections are committed as one leaf each, holding their JSON encoding.
fn json_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn timestamp_bytes(ts: &Option<DateTime<Utc>>) -> Vec<u8> {
    ts.map(|t| t.timestamp().to_be_bytes().to_vec())
        .unwrap_or_default()
}

impl Model for Entity {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Entity
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
            DataField::new(
                "identity",
                1,
                d.identity.map(|i| i.to_vec()).unwrap_or_default(),
            ),
            DataField::new("legal_name", 2, d.legal_name.as_bytes()),
            DataField::new("addresses", 3, json_bytes(&d.addresses)),
            DataField::new("payment_methods", 4, json_bytes(&d.payment_methods)),
            DataField::new("contacts", 5, json_bytes(&d.contacts)),
            DataField::new("date_created", 6, timestamp_bytes(&d.date_created)),
        ]
    }

    fn field_salts(&self) -> &FieldSalts {
        &self.salts
    }

    fn field_salts_mut(&mut self) -> &mut FieldSalts {
        &mut self.salts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityRelationshipData {
    /// Identity that owns the entity.
    pub owner_identity: Option<IssuerId>,
    /// Identity being granted access.
    pub target_identity: Option<IssuerId>,
    /// Document identifier of the entity.
    pub entity_identifier: Option<Identifier>,
    /// Block height after which the relationship lapses.
    pub expiration_block: Option<u64>,
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelationship {
    pub core: CoreDocument,
    pub data: EntityRelationshipData,
    #[serde(default)]
    pub salts: FieldSalts,
}

impl EntityRelationship {
    pub fn new(data: EntityRelationshipData) -> Self {
        let mut relationship = Self {
            core: CoreDocument::new(),
            data,
            salts: FieldSalts::new(),
        };
        relationship.fill_salts();
        relationship
    }

    /// Whether the relationship still holds at `block`.
    pub fn is_active_at(&self, block: u64) -> bool {
        self.data.expiration_block.map_or(true, |exp| block <= exp)
    }
}

impl Model for EntityRelationship {
    fn kind(&self) -> DocumentKind {
        DocumentKind::EntityRelationship
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
            DataField::new(
                "owner_identity",
                1,
                d.owner_identity.map(|i| i.to_vec()).unwrap_or_default(),
            ),
            DataField::new(
                "target_identity",
                2,
                d.target_identity.map(|i| i.to_vec()).unwrap_or_default(),
            ),
            DataField::new(
                "entity_identifier",
                3,
                d.entity_identifier.map(|i| i.to_vec()).unwrap_or_default(),
            ),
            DataField::new(
                "expiration_block",
                4,
                d.expiration_block
                    .map(|b| b.to_be_bytes().to_vec())
                    .unwrap_or_default(),
            ),
            DataField::new("date_created", 5, timestamp_bytes(&d.date_created)),
        ]
    }

    fn field_salts(&self) -> &FieldSalts {
        &self.salts
    }

    fn field_salts_mut(&mut self) -> &mut FieldSalts {
        &mut self.salts
    }
}
