//! Dialog identifiers, per-dialog step states, and the typed scratch
//! fields a session carries between steps.

use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{EntryRecord, FieldKey};
use crate::store::RowPosition;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DialogId {
    Create,
    Read,
    Update,
    Delete,
    Insights,
}

impl DialogId {
    pub fn name(self) -> &'static str {
        match self {
            DialogId::Create => "create",
            DialogId::Read => "read",
            DialogId::Update => "update",
            DialogId::Delete => "delete",
            DialogId::Insights => "insights",
        }
    }
}

impl std::fmt::Display for DialogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CreateState {
    ChooseEntryType,
    BatchSelectLocation,
    BatchEnterRemark,
    BatchToggleProducts,
    BatchEnterPrice,
    BatchConfirm,
    SingleSelectProduct,
    SingleEnterPrice,
    SingleSelectLocation,
    SingleEnterRemark,
    SingleConfirm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadState {
    AwaitingMenuChoice,
    AwaitingIdInput,
    Paginating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateState {
    AskId,
    SelectFields,
    EnterValues,
    Confirm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeleteState {
    AskId,
    Confirm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InsightsState {
    MenuDisplayed,
}

/// A step state, tagged by the dialog it belongs to. The dispatcher
/// rejects any transition into a state of a different dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DialogState {
    Create(CreateState),
    Read(ReadState),
    Update(UpdateState),
    Delete(DeleteState),
    Insights(InsightsState),
}

impl DialogState {
    pub fn dialog(self) -> DialogId {
        match self {
            DialogState::Create(_) => DialogId::Create,
            DialogState::Read(_) => DialogId::Read,
            DialogState::Update(_) => DialogId::Update,
            DialogState::Delete(_) => DialogId::Delete,
            DialogState::Insights(_) => DialogId::Insights,
        }
    }
}

/// One product priced within a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchLine {
    pub product: String,
    pub price: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateFields {
    // Single-entry draft.
    pub product: Option<String>,
    pub price: Option<Decimal>,
    pub location: Option<String>,
    pub remark: Option<String>,
    // Batch flow.
    pub batch_location: Option<String>,
    pub batch_remark: Option<String>,
    pub selected_products: Vec<String>,
    pub price_queue: VecDeque<String>,
    pub awaiting_price_for: Option<String>,
    pub batch_lines: Vec<BatchLine>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadFields;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateFields {
    pub entry_id: Option<String>,
    pub row: Option<RowPosition>,
    pub original: Option<EntryRecord>,
    pub selected: Vec<FieldKey>,
    pub queue: VecDeque<FieldKey>,
    pub current: Option<FieldKey>,
    pub new_values: BTreeMap<FieldKey, String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteFields {
    pub entry_id: Option<String>,
    pub row: Option<RowPosition>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InsightsFields;

/// Raised when a handler asks for another dialog's fields. Cannot happen
/// through the dispatcher, which always seeds fields for the graph it is
/// routing into.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("session fields belong to dialog `{actual}` but `{expected}` was required")]
pub struct FieldsMismatch {
    pub expected: DialogId,
    pub actual: DialogId,
}

/// Per-session scratch space, tagged per dialog so a handler can only see
/// the keys of its own flow.
#[derive(Clone, Debug, PartialEq)]
pub enum DialogFields {
    Create(CreateFields),
    Read(ReadFields),
    Update(UpdateFields),
    Delete(DeleteFields),
    Insights(InsightsFields),
}

impl DialogFields {
    pub fn for_dialog(dialog: DialogId) -> Self {
        match dialog {
            DialogId::Create => DialogFields::Create(CreateFields::default()),
            DialogId::Read => DialogFields::Read(ReadFields),
            DialogId::Update => DialogFields::Update(UpdateFields::default()),
            DialogId::Delete => DialogFields::Delete(DeleteFields::default()),
            DialogId::Insights => DialogFields::Insights(InsightsFields),
        }
    }

    pub fn dialog(&self) -> DialogId {
        match self {
            DialogFields::Create(_) => DialogId::Create,
            DialogFields::Read(_) => DialogId::Read,
            DialogFields::Update(_) => DialogId::Update,
            DialogFields::Delete(_) => DialogId::Delete,
            DialogFields::Insights(_) => DialogId::Insights,
        }
    }

    pub fn as_create_mut(&mut self) -> Result<&mut CreateFields, FieldsMismatch> {
        match self {
            DialogFields::Create(fields) => Ok(fields),
            other => {
                Err(FieldsMismatch { expected: DialogId::Create, actual: other.dialog() })
            }
        }
    }

    pub fn as_update_mut(&mut self) -> Result<&mut UpdateFields, FieldsMismatch> {
        match self {
            DialogFields::Update(fields) => Ok(fields),
            other => {
                Err(FieldsMismatch { expected: DialogId::Update, actual: other.dialog() })
            }
        }
    }

    pub fn as_delete_mut(&mut self) -> Result<&mut DeleteFields, FieldsMismatch> {
        match self {
            DialogFields::Delete(fields) => Ok(fields),
            other => {
                Err(FieldsMismatch { expected: DialogId::Delete, actual: other.dialog() })
            }
        }
    }
}
