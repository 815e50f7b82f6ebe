//! Remote request objects
//!
//! The batch endpoint accepts a list of single-key objects such as
//! `{"addSheet": {...}}`. [`RequestKind`] names the key; [`RemoteRequest`]
//! pairs it with the body.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Request object kinds understood by the remote batch endpoint
///
/// Variants are named after their wire keys.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    UpdateCells,
    AppendCells,
    InsertDimension,
    DeleteDimension,
    AddSheet,
    DeleteSheet,
    DuplicateSheet,
    UpdateSheetProperties,
    SortRange,
    AutoResizeDimensions,
    RepeatCell,
    MergeCells,
    UnmergeCells,
    UpdateBorders,
    AddConditionalFormatRule,
    DeleteConditionalFormatRule,
    SetDataValidation,
    AddChart,
    UpdateChartSpec,
    DeleteEmbeddedObject,
    SetBasicFilter,
    ClearBasicFilter,
    AddFilterView,
    DeleteFilterView,
    AddNamedRange,
    DeleteNamedRange,
    UpdateSpreadsheetProperties,
    AddProtectedRange,
    DeleteProtectedRange,
    CutPaste,
    CopyPaste,
    FindReplace,
}

impl RequestKind {
    /// Every request kind, in declaration order
    pub const ALL: [RequestKind; 32] = [
        RequestKind::UpdateCells,
        RequestKind::AppendCells,
        RequestKind::InsertDimension,
        RequestKind::DeleteDimension,
        RequestKind::AddSheet,
        RequestKind::DeleteSheet,
        RequestKind::DuplicateSheet,
        RequestKind::UpdateSheetProperties,
        RequestKind::SortRange,
        RequestKind::AutoResizeDimensions,
        RequestKind::RepeatCell,
        RequestKind::MergeCells,
        RequestKind::UnmergeCells,
        RequestKind::UpdateBorders,
        RequestKind::AddConditionalFormatRule,
        RequestKind::DeleteConditionalFormatRule,
        RequestKind::SetDataValidation,
        RequestKind::AddChart,
        RequestKind::UpdateChartSpec,
        RequestKind::DeleteEmbeddedObject,
        RequestKind::SetBasicFilter,
        RequestKind::ClearBasicFilter,
        RequestKind::AddFilterView,
        RequestKind::DeleteFilterView,
        RequestKind::AddNamedRange,
        RequestKind::DeleteNamedRange,
        RequestKind::UpdateSpreadsheetProperties,
        RequestKind::AddProtectedRange,
        RequestKind::DeleteProtectedRange,
        RequestKind::CutPaste,
        RequestKind::CopyPaste,
        RequestKind::FindReplace,
    ];

    /// Wire key of this request kind
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::UpdateCells => "updateCells",
            RequestKind::AppendCells => "appendCells",
            RequestKind::InsertDimension => "insertDimension",
            RequestKind::DeleteDimension => "deleteDimension",
            RequestKind::AddSheet => "addSheet",
            RequestKind::DeleteSheet => "deleteSheet",
            RequestKind::DuplicateSheet => "duplicateSheet",
            RequestKind::UpdateSheetProperties => "updateSheetProperties",
            RequestKind::SortRange => "sortRange",
            RequestKind::AutoResizeDimensions => "autoResizeDimensions",
            RequestKind::RepeatCell => "repeatCell",
            RequestKind::MergeCells => "mergeCells",
            RequestKind::UnmergeCells => "unmergeCells",
            RequestKind::UpdateBorders => "updateBorders",
            RequestKind::AddConditionalFormatRule => "addConditionalFormatRule",
            RequestKind::DeleteConditionalFormatRule => "deleteConditionalFormatRule",
            RequestKind::SetDataValidation => "setDataValidation",
            RequestKind::AddChart => "addChart",
            RequestKind::UpdateChartSpec => "updateChartSpec",
            RequestKind::DeleteEmbeddedObject => "deleteEmbeddedObject",
            RequestKind::SetBasicFilter => "setBasicFilter",
            RequestKind::ClearBasicFilter => "clearBasicFilter",
            RequestKind::AddFilterView => "addFilterView",
            RequestKind::DeleteFilterView => "deleteFilterView",
            RequestKind::AddNamedRange => "addNamedRange",
            RequestKind::DeleteNamedRange => "deleteNamedRange",
            RequestKind::UpdateSpreadsheetProperties => "updateSpreadsheetProperties",
            RequestKind::AddProtectedRange => "addProtectedRange",
            RequestKind::DeleteProtectedRange => "deleteProtectedRange",
            RequestKind::CutPaste => "cutPaste",
            RequestKind::CopyPaste => "copyPaste",
            RequestKind::FindReplace => "findReplace",
        }
    }

    /// Look up a kind by wire key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compiled request object
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    kind: RequestKind,
    body: Map<String, Value>,
}

impl RemoteRequest {
    /// Create a request of `kind` with the given body
    pub fn new(kind: RequestKind, body: Map<String, Value>) -> Self {
        Self { kind, body }
    }

    /// Request kind
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Request body (the value under the kind key)
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Render as the single-key wire object
    pub fn to_json(&self) -> Value {
        let mut outer = Map::with_capacity(1);
        outer.insert(self.kind.as_str().to_string(), Value::Object(self.body.clone()));
        Value::Object(outer)
    }
}

impl Serialize for RemoteRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.kind.as_str(), &self.body)?;
        map.end()
    }
}
