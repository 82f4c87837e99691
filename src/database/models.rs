//! Data models for SWL wallet tables
//!
//! Each record is a value snapshot of one row. Encrypted fields hold raw
//! ciphertext; decryption happens on demand through a cipher.

use serde::{Deserialize, Serialize};

use super::marshal::impl_record;
use super::record_id::RecordID;
use super::value::ColumnValue;
use crate::LEGACY_SYNC_ID;

/// Folder-like container of categories and cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: RecordID,
    /// Encrypted name
    pub name: Vec<u8>,
    /// Encrypted description
    pub description: Option<Vec<u8>>,
    pub icon_id: RecordID,
    /// Parent category, or the root id
    pub parent_id: RecordID,
    pub sync_id: i64,
    pub created_sync_id: i64,
}

impl Category {
    pub fn new(name: Vec<u8>, parent_id: RecordID, icon_id: RecordID) -> Self {
        Self {
            id: RecordID::generate(),
            name,
            description: None,
            icon_id,
            parent_id,
            sync_id: LEGACY_SYNC_ID,
            created_sync_id: LEGACY_SYNC_ID,
        }
    }
}

impl_record!(Category, "spbwlt_Category", [
    "id": Text => id,
    "name": Blob => name,
    "description": OptionalBlob => description,
    "iconID": Text => icon_id,
    "parentCategoryID": Text => parent_id,
    "syncID": Integer => sync_id,
    "createdSyncID": Integer => created_sync_id,
]);

/// One stored credential set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: RecordID,
    pub category_id: RecordID,
    pub template_id: RecordID,
    /// Encrypted name
    pub name: Vec<u8>,
    /// Encrypted description
    pub description: Option<Vec<u8>>,
    pub icon_id: RecordID,
    pub hit_count: i64,
    pub sync_id: i64,
    pub created_sync_id: i64,
}

impl Card {
    pub fn new(category_id: RecordID, template_id: RecordID, name: Vec<u8>, icon_id: RecordID) -> Self {
        Self {
            id: RecordID::generate(),
            category_id,
            template_id,
            name,
            description: None,
            icon_id,
            hit_count: 0,
            sync_id: LEGACY_SYNC_ID,
            created_sync_id: LEGACY_SYNC_ID,
        }
    }
}

impl_record!(Card, "spbwlt_Card", [
    "id": Text => id,
    "categoryID": Text => category_id,
    "templateID": Text => template_id,
    "name": Blob => name,
    "description": OptionalBlob => description,
    "iconID": Text => icon_id,
    "hitCount": Integer => hit_count,
    "advancedData": Blob = ColumnValue::Blob(Vec::new()),
    "syncID": Integer => sync_id,
    "createdSyncID": Integer => created_sync_id,
]);

/// Value of one template field on one card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFieldValue {
    pub id: RecordID,
    pub card_id: RecordID,
    pub template_field_id: RecordID,
    /// Encrypted value
    pub value: Vec<u8>,
    pub sync_id: i64,
    pub created_sync_id: i64,
}

impl CardFieldValue {
    pub fn new(card_id: RecordID, template_field_id: RecordID, value: Vec<u8>) -> Self {
        Self {
            id: RecordID::generate(),
            card_id,
            template_field_id,
            value,
            sync_id: LEGACY_SYNC_ID,
            created_sync_id: LEGACY_SYNC_ID,
        }
    }
}

impl_record!(CardFieldValue, "spbwlt_CardFieldValue", [
    "id": Text => id,
    "cardID": Text => card_id,
    "templateFieldID": Text => template_field_id,
    "value": Blob => value,
    "syncID": Integer => sync_id,
    "createdSyncID": Integer => created_sync_id,
]);

/// File attached to a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAttachment {
    pub id: RecordID,
    pub card_id: RecordID,
    /// Encrypted file name
    pub name: Vec<u8>,
    /// Encrypted file contents
    pub data: Vec<u8>,
    pub sync_id: i64,
    pub created_sync_id: i64,
}

impl CardAttachment {
    pub fn new(card_id: RecordID, name: Vec<u8>, data: Vec<u8>) -> Self {
        Self {
            id: RecordID::generate(),
            card_id,
            name,
            data,
            sync_id: LEGACY_SYNC_ID,
            created_sync_id: LEGACY_SYNC_ID,
        }
    }
}

impl_record!(CardAttachment, "spbwlt_CardAttachment", [
    "id": Text => id,
    "cardID": Text => card_id,
    "name": Blob => name,
    "data": Blob => data,
    "syncID": Integer => sync_id,
    "createdSyncID": Integer => created_sync_id,
]);

/// Card layout: which fields a card of this template exposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: RecordID,
    /// Encrypted name
    pub name: Vec<u8>,
    /// Encrypted description
    pub description: Option<Vec<u8>>,
    pub sync_id: i64,
    pub created_sync_id: i64,
}

impl Template {
    pub fn new(name: Vec<u8>) -> Self {
        Self {
            id: RecordID::generate(),
            name,
            description: None,
            sync_id: LEGACY_SYNC_ID,
            created_sync_id: LEGACY_SYNC_ID,
        }
    }
}

impl_record!(Template, "spbwlt_Template", [
    "id": Text => id,
    "name": Blob => name,
    "description": OptionalBlob => description,
    "syncID": Integer => sync_id,
    "createdSyncID": Integer => created_sync_id,
]);

/// Named field of a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateField {
    pub id: RecordID,
    pub template_id: RecordID,
    /// Encrypted field name
    pub name: Vec<u8>,
    pub field_type_id: i64,
    pub priority: i64,
    pub sync_id: i64,
    pub created_sync_id: i64,
}

impl TemplateField {
    pub fn new(template_id: RecordID, name: Vec<u8>, field_type_id: i64, priority: i64) -> Self {
        Self {
            id: RecordID::generate(),
            template_id,
            name,
            field_type_id,
            priority,
            sync_id: LEGACY_SYNC_ID,
            created_sync_id: LEGACY_SYNC_ID,
        }
    }
}

impl_record!(TemplateField, "spbwlt_TemplateField", [
    "id": Text => id,
    "templateID": Text => template_id,
    "name": Blob => name,
    "fieldTypeID": Integer => field_type_id,
    "priority": Integer => priority,
    "advancedInfo": OptionalBlob = ColumnValue::OptionalBlob(None),
    "syncID": Integer => sync_id,
    "createdSyncID": Integer => created_sync_id,
]);

/// Kind of a template field (text, password, date, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFieldType {
    pub id: i64,
    /// Plain-text type name
    pub name: String,
    pub priority: i64,
}

impl_record!(TemplateFieldType, "spbwlt_FieldType", [
    "fieldTypeID": Integer => id,
    "name": Text => name,
    "priority": Integer => priority,
]);

/// Icon image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    pub id: RecordID,
    /// Image bytes, stored unencrypted
    pub data: Vec<u8>,
    pub group_id: i64,
}

impl_record!(Icon, "spbwlt_Icon", [
    "id": Text => id,
    "data": Blob => data,
    "groupID": Integer => group_id,
]);

/// The wallet singleton row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub id: RecordID,
    /// Encrypted wallet name
    pub name: Vec<u8>,
    /// Encrypted description
    pub description: Option<Vec<u8>>,
    pub sync_id: i64,
    pub created_sync_id: i64,
}

impl WalletInfo {
    pub fn new(name: Vec<u8>) -> Self {
        Self {
            id: RecordID::generate(),
            name,
            description: None,
            sync_id: LEGACY_SYNC_ID,
            created_sync_id: LEGACY_SYNC_ID,
        }
    }
}

impl_record!(WalletInfo, "spbwlt_Wallet", [
    "id": Text => id,
    "name": Blob => name,
    "description": OptionalBlob => description,
    "syncID": Integer => sync_id,
    "createdSyncID": Integer => created_sync_id,
]);

/// Schema version singleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseVersion {
    pub version: i64,
}

impl_record!(DatabaseVersion, "spbwlt_DatabaseVersion", [
    "versionNumber": Integer => version,
]);

/// Key derivation parameters of the active cipher
///
/// Absent from legacy wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub id: i64,
    pub pbkdf2_rounds: i64,
    pub pbkdf2_salt: Vec<u8>,
}

impl DatabaseMetadata {
    /// Id of the singleton row
    pub const SINGLETON_ID: i64 = 1;

    pub fn new(pbkdf2_rounds: i64, pbkdf2_salt: Vec<u8>) -> Self {
        Self {
            id: Self::SINGLETON_ID,
            pbkdf2_rounds,
            pbkdf2_salt,
        }
    }
}

impl_record!(DatabaseMetadata, "spbwlt_DatabaseMetadata", [
    "id": Integer => id,
    "pbkdf2Rounds": Integer => pbkdf2_rounds,
    "pbkdf2Salt": Blob => pbkdf2_salt,
]);
