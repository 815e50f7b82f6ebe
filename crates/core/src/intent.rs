//! Intent model
//!
//! An [`Intent`] is a resource-agnostic description of one edit. Every
//! [`IntentType`] is statically classified through lookup tables:
//!
//! - `request_kind()`: the remote request object it compiles to. A few types
//!   share a shape on purpose (`SetValues` and `ClearValues` are both
//!   `updateCells`, with different bodies).
//! - `is_destructive()`: the edit can lose data.
//! - `is_high_risk()`: destructive enough that a snapshot is taken no
//!   matter what the caller asked for.
//! - `target_scope()`: which parts of the [`Target`] must be present.
//!
//! Intents are immutable once built; a transaction owns them after `queue`.

use crate::a1;
use crate::error::{Error, Result};
use crate::request::RequestKind;
use crate::types::{IntentId, ResourceId, Target, TransactionId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The fixed enumeration of edit types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentType {
    // values
    /// Write cell values into a range
    SetValues,
    /// Clear cell values in a range
    ClearValues,
    /// Append rows after the last row with data
    AppendRows,

    // structure
    /// Insert rows
    InsertRows,
    /// Delete rows
    DeleteRows,
    /// Insert columns
    InsertColumns,
    /// Delete columns
    DeleteColumns,
    /// Add a sheet
    AddSheet,
    /// Delete a sheet
    DeleteSheet,
    /// Duplicate a sheet
    DuplicateSheet,
    /// Rename a sheet
    RenameSheet,
    /// Sort a range
    SortRange,
    /// Fit row heights or column widths to content
    AutoResize,

    // formatting
    /// Apply a cell format to a range
    FormatCells,
    /// Merge cells
    MergeCells,
    /// Unmerge cells
    UnmergeCells,
    /// Set borders on a range
    SetBorders,
    /// Add a conditional format rule
    AddConditionalFormat,
    /// Delete a conditional format rule
    DeleteConditionalFormat,

    // validation
    /// Set a data validation rule
    SetDataValidation,
    /// Clear data validation
    ClearDataValidation,

    // visualization
    /// Add a chart
    AddChart,
    /// Update a chart spec
    UpdateChart,
    /// Delete a chart
    DeleteChart,

    // filtering
    /// Set the basic filter
    SetBasicFilter,
    /// Clear the basic filter
    ClearBasicFilter,
    /// Add a filter view
    AddFilterView,
    /// Delete a filter view
    DeleteFilterView,

    // naming
    /// Add a named range
    AddNamedRange,
    /// Delete a named range
    DeleteNamedRange,

    // metadata
    /// Update spreadsheet-level properties
    UpdateSpreadsheetProperties,
    /// Protect a range
    AddProtectedRange,
    /// Remove a range protection
    DeleteProtectedRange,

    // cut/paste, find/replace
    /// Move a range
    CutPaste,
    /// Copy a range
    CopyPaste,
    /// Find and replace text
    FindReplace,
}

/// Broad family an intent type belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum IntentCategory {
    Values,
    Structure,
    Formatting,
    Validation,
    Visualization,
    Filtering,
    Naming,
    Metadata,
    CutPaste,
    FindReplace,
}

/// Which parts of a [`Target`] an intent type needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetScope {
    /// Sheet id and A1 locator
    Range,
    /// Sheet id
    Sheet,
    /// Nothing beyond the resource id
    Spreadsheet,
}

impl IntentType {
    /// Every intent type, in declaration order
    pub const ALL: [IntentType; 36] = [
        IntentType::SetValues,
        IntentType::ClearValues,
        IntentType::AppendRows,
        IntentType::InsertRows,
        IntentType::DeleteRows,
        IntentType::InsertColumns,
        IntentType::DeleteColumns,
        IntentType::AddSheet,
        IntentType::DeleteSheet,
        IntentType::DuplicateSheet,
        IntentType::RenameSheet,
        IntentType::SortRange,
        IntentType::AutoResize,
        IntentType::FormatCells,
        IntentType::MergeCells,
        IntentType::UnmergeCells,
        IntentType::SetBorders,
        IntentType::AddConditionalFormat,
        IntentType::DeleteConditionalFormat,
        IntentType::SetDataValidation,
        IntentType::ClearDataValidation,
        IntentType::AddChart,
        IntentType::UpdateChart,
        IntentType::DeleteChart,
        IntentType::SetBasicFilter,
        IntentType::ClearBasicFilter,
        IntentType::AddFilterView,
        IntentType::DeleteFilterView,
        IntentType::AddNamedRange,
        IntentType::DeleteNamedRange,
        IntentType::UpdateSpreadsheetProperties,
        IntentType::AddProtectedRange,
        IntentType::DeleteProtectedRange,
        IntentType::CutPaste,
        IntentType::CopyPaste,
        IntentType::FindReplace,
    ];

    /// Wire name, e.g. `SET_VALUES`
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::SetValues => "SET_VALUES",
            IntentType::ClearValues => "CLEAR_VALUES",
            IntentType::AppendRows => "APPEND_ROWS",
            IntentType::InsertRows => "INSERT_ROWS",
            IntentType::DeleteRows => "DELETE_ROWS",
            IntentType::InsertColumns => "INSERT_COLUMNS",
            IntentType::DeleteColumns => "DELETE_COLUMNS",
            IntentType::AddSheet => "ADD_SHEET",
            IntentType::DeleteSheet => "DELETE_SHEET",
            IntentType::DuplicateSheet => "DUPLICATE_SHEET",
            IntentType::RenameSheet => "RENAME_SHEET",
            IntentType::SortRange => "SORT_RANGE",
            IntentType::AutoResize => "AUTO_RESIZE",
            IntentType::FormatCells => "FORMAT_CELLS",
            IntentType::MergeCells => "MERGE_CELLS",
            IntentType::UnmergeCells => "UNMERGE_CELLS",
            IntentType::SetBorders => "SET_BORDERS",
            IntentType::AddConditionalFormat => "ADD_CONDITIONAL_FORMAT",
            IntentType::DeleteConditionalFormat => "DELETE_CONDITIONAL_FORMAT",
            IntentType::SetDataValidation => "SET_DATA_VALIDATION",
            IntentType::ClearDataValidation => "CLEAR_DATA_VALIDATION",
            IntentType::AddChart => "ADD_CHART",
            IntentType::UpdateChart => "UPDATE_CHART",
            IntentType::DeleteChart => "DELETE_CHART",
            IntentType::SetBasicFilter => "SET_BASIC_FILTER",
            IntentType::ClearBasicFilter => "CLEAR_BASIC_FILTER",
            IntentType::AddFilterView => "ADD_FILTER_VIEW",
            IntentType::DeleteFilterView => "DELETE_FILTER_VIEW",
            IntentType::AddNamedRange => "ADD_NAMED_RANGE",
            IntentType::DeleteNamedRange => "DELETE_NAMED_RANGE",
            IntentType::UpdateSpreadsheetProperties => "UPDATE_SPREADSHEET_PROPERTIES",
            IntentType::AddProtectedRange => "ADD_PROTECTED_RANGE",
            IntentType::DeleteProtectedRange => "DELETE_PROTECTED_RANGE",
            IntentType::CutPaste => "CUT_PASTE",
            IntentType::CopyPaste => "COPY_PASTE",
            IntentType::FindReplace => "FIND_REPLACE",
        }
    }

    /// Parse a type name
    ///
    /// Accepts the wire name in any case, with `-` or `_` separators.
    ///
    /// # Errors
    /// `Error::UnknownIntentType` for names outside the enumeration.
    pub fn parse(name: &str) -> Result<Self> {
        let normalized = name.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| Error::UnknownIntentType {
                name: name.to_string(),
            })
    }

    /// Family this type belongs to
    pub fn category(&self) -> IntentCategory {
        use IntentType::*;
        match self {
            SetValues | ClearValues | AppendRows => IntentCategory::Values,
            InsertRows | DeleteRows | InsertColumns | DeleteColumns | AddSheet | DeleteSheet
            | DuplicateSheet | RenameSheet | SortRange | AutoResize => IntentCategory::Structure,
            FormatCells | MergeCells | UnmergeCells | SetBorders | AddConditionalFormat
            | DeleteConditionalFormat => IntentCategory::Formatting,
            SetDataValidation | ClearDataValidation => IntentCategory::Validation,
            AddChart | UpdateChart | DeleteChart => IntentCategory::Visualization,
            SetBasicFilter | ClearBasicFilter | AddFilterView | DeleteFilterView => {
                IntentCategory::Filtering
            }
            AddNamedRange | DeleteNamedRange => IntentCategory::Naming,
            UpdateSpreadsheetProperties | AddProtectedRange | DeleteProtectedRange => {
                IntentCategory::Metadata
            }
            CutPaste | CopyPaste => IntentCategory::CutPaste,
            FindReplace => IntentCategory::FindReplace,
        }
    }

    /// Remote request object this type compiles to
    pub fn request_kind(&self) -> RequestKind {
        use IntentType::*;
        match self {
            SetValues | ClearValues => RequestKind::UpdateCells,
            AppendRows => RequestKind::AppendCells,
            InsertRows | InsertColumns => RequestKind::InsertDimension,
            DeleteRows | DeleteColumns => RequestKind::DeleteDimension,
            AddSheet => RequestKind::AddSheet,
            DeleteSheet => RequestKind::DeleteSheet,
            DuplicateSheet => RequestKind::DuplicateSheet,
            RenameSheet => RequestKind::UpdateSheetProperties,
            SortRange => RequestKind::SortRange,
            AutoResize => RequestKind::AutoResizeDimensions,
            FormatCells => RequestKind::RepeatCell,
            MergeCells => RequestKind::MergeCells,
            UnmergeCells => RequestKind::UnmergeCells,
            SetBorders => RequestKind::UpdateBorders,
            AddConditionalFormat => RequestKind::AddConditionalFormatRule,
            DeleteConditionalFormat => RequestKind::DeleteConditionalFormatRule,
            SetDataValidation | ClearDataValidation => RequestKind::SetDataValidation,
            AddChart => RequestKind::AddChart,
            UpdateChart => RequestKind::UpdateChartSpec,
            DeleteChart => RequestKind::DeleteEmbeddedObject,
            SetBasicFilter => RequestKind::SetBasicFilter,
            ClearBasicFilter => RequestKind::ClearBasicFilter,
            AddFilterView => RequestKind::AddFilterView,
            DeleteFilterView => RequestKind::DeleteFilterView,
            AddNamedRange => RequestKind::AddNamedRange,
            DeleteNamedRange => RequestKind::DeleteNamedRange,
            UpdateSpreadsheetProperties => RequestKind::UpdateSpreadsheetProperties,
            AddProtectedRange => RequestKind::AddProtectedRange,
            DeleteProtectedRange => RequestKind::DeleteProtectedRange,
            CutPaste => RequestKind::CutPaste,
            CopyPaste => RequestKind::CopyPaste,
            FindReplace => RequestKind::FindReplace,
        }
    }

    /// Whether the edit can lose data
    pub fn is_destructive(&self) -> bool {
        use IntentType::*;
        self.is_high_risk()
            || matches!(
                self,
                DeleteChart
                    | DeleteNamedRange
                    | DeleteConditionalFormat
                    | ClearDataValidation
                    | ClearBasicFilter
                    | DeleteFilterView
                    | DeleteProtectedRange
                    | SortRange
                    | UnmergeCells
                    | CopyPaste
            )
    }

    /// Whether the edit always requires a snapshot
    pub fn is_high_risk(&self) -> bool {
        use IntentType::*;
        matches!(
            self,
            DeleteSheet | DeleteRows | DeleteColumns | ClearValues | CutPaste | FindReplace
        )
    }

    /// Parts of the target this type needs
    pub fn target_scope(&self) -> TargetScope {
        use IntentType::*;
        match self {
            SetValues | ClearValues | FormatCells | MergeCells | UnmergeCells | SetBorders
            | AddConditionalFormat | SetDataValidation | ClearDataValidation | SetBasicFilter
            | AddFilterView | AddNamedRange | AddProtectedRange | CutPaste | CopyPaste
            | SortRange => TargetScope::Range,
            AppendRows | InsertRows | DeleteRows | InsertColumns | DeleteColumns | DeleteSheet
            | DuplicateSheet | RenameSheet | AutoResize | DeleteConditionalFormat | AddChart
            | ClearBasicFilter => TargetScope::Sheet,
            AddSheet | UpdateChart | DeleteChart | DeleteFilterView | DeleteNamedRange
            | UpdateSpreadsheetProperties | DeleteProtectedRange | FindReplace => {
                TargetScope::Spreadsheet
            }
        }
    }

    /// Payload keys that must be present
    pub fn required_payload_keys(&self) -> &'static [&'static str] {
        use IntentType::*;
        match self {
            SetValues | AppendRows => &["values"],
            InsertRows | DeleteRows | InsertColumns | DeleteColumns => &["startIndex", "endIndex"],
            RenameSheet => &["title"],
            FormatCells => &["format"],
            AddConditionalFormat => &["rule"],
            DeleteConditionalFormat => &["index"],
            SetDataValidation => &["rule"],
            AddChart => &["spec"],
            UpdateChart => &["chartId", "spec"],
            DeleteChart => &["objectId"],
            DeleteFilterView => &["filterId"],
            AddNamedRange => &["name"],
            DeleteNamedRange => &["namedRangeId"],
            UpdateSpreadsheetProperties => &["properties"],
            DeleteProtectedRange => &["protectedRangeId"],
            CutPaste | CopyPaste => &["destination"],
            FindReplace => &["find", "replacement"],
            SortRange => &["sortSpecs"],
            ClearValues | AddSheet | DeleteSheet | DuplicateSheet | AutoResize | MergeCells
            | UnmergeCells | SetBorders | ClearDataValidation | SetBasicFilter
            | ClearBasicFilter | AddFilterView | AddProtectedRange => &[],
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping carried alongside an intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentMetadata {
    /// Tool that produced the intent
    #[serde(default)]
    pub origin_tool: String,
    /// Action within that tool
    #[serde(default)]
    pub origin_action: String,
    /// Transaction the intent was queued into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    /// Caller-assigned priority; informational only
    #[serde(default)]
    pub priority: i32,
    /// Data-loss risk
    #[serde(default)]
    pub destructive: bool,
    /// Caller estimate of cells touched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cells_affected: Option<u64>,
}

/// One semantic edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    id: IntentId,
    #[serde(rename = "type")]
    intent_type: IntentType,
    target: Target,
    payload: Map<String, Value>,
    metadata: IntentMetadata,
}

impl Intent {
    /// Start building an intent
    pub fn builder(intent_type: IntentType, target: Target) -> IntentBuilder {
        IntentBuilder::new(intent_type, target)
    }

    /// Build an intent from the calling layer's loose JSON shape
    ///
    /// ```text
    /// { "type": "SET_VALUES",
    ///   "target": { "resourceId": "...", "subResourceId": 0, "locator": "A1:B2" },
    ///   "payload": { "values": [[1, 2], [3, 4]] },
    ///   "metadata": { "originTool": "sheets_data", "originAction": "write" } }
    /// ```
    ///
    /// # Errors
    /// - `UnknownIntentType` if `type` is missing or not in the enumeration
    /// - `MalformedTarget` if `target` cannot be read or lacks what the type needs
    /// - `InvalidIntent` for a non-object payload or missing payload keys
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut obj) = value else {
            return Err(Error::InvalidIntent {
                reason: "intent must be a JSON object".to_string(),
            });
        };

        let type_name = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnknownIntentType {
                name: obj.get("type").map(|v| v.to_string()).unwrap_or_default(),
            })?;
        let intent_type = IntentType::parse(type_name)?;

        let target = obj
            .remove("target")
            .ok_or_else(|| Error::malformed_target("target is missing"))?;
        let target: Target = serde_json::from_value(target)
            .map_err(|e| Error::malformed_target(e.to_string()))?;

        let payload = match obj.remove("payload") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(p) => p,
        };

        let metadata: IntentMetadata = match obj.remove("metadata") {
            None | Some(Value::Null) => IntentMetadata::default(),
            Some(m) => serde_json::from_value(m).map_err(|e| Error::InvalidIntent {
                reason: format!("metadata: {}", e),
            })?,
        };

        IntentBuilder::new(intent_type, target)
            .payload(payload)
            .metadata(metadata)
            .build()
    }

    /// Unique id
    pub fn id(&self) -> IntentId {
        self.id
    }

    /// Edit type
    pub fn intent_type(&self) -> IntentType {
        self.intent_type
    }

    /// Where the edit applies
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Spreadsheet the edit applies to
    pub fn resource_id(&self) -> &ResourceId {
        &self.target.resource_id
    }

    /// Type-specific payload
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Bookkeeping
    pub fn metadata(&self) -> &IntentMetadata {
        &self.metadata
    }

    /// Destructive per type or per caller flag
    pub fn is_destructive(&self) -> bool {
        self.metadata.destructive
    }

    /// High risk per type
    pub fn is_high_risk(&self) -> bool {
        self.intent_type.is_high_risk()
    }

    /// Cells this intent is expected to touch
    ///
    /// Caller estimate first, then the size of the A1 locator, then the size
    /// of a `values` payload.
    pub fn estimated_cells(&self) -> Option<u64> {
        if let Some(n) = self.metadata.estimated_cells_affected {
            return Some(n);
        }
        if let Some(range) = self.target.locator.as_deref().and_then(a1::parse_range) {
            return Some(range.cells());
        }
        self.payload.get("values").and_then(Value::as_array).map(|rows| {
            rows.iter()
                .map(|row| row.as_array().map(|r| r.len() as u64).unwrap_or(1))
                .fold(0u64, u64::saturating_add)
        })
    }

    /// Check target and payload against the type's requirements
    pub fn validate(&self) -> Result<()> {
        if self.target.resource_id.is_empty() {
            return Err(Error::malformed_target("resourceId is empty"));
        }
        match self.intent_type.target_scope() {
            TargetScope::Range => {
                if self.target.sub_resource_id.is_none() {
                    return Err(Error::malformed_target(format!(
                        "{} requires subResourceId",
                        self.intent_type
                    )));
                }
                match self.target.locator.as_deref() {
                    Some(l) if !l.trim().is_empty() => {}
                    _ => {
                        return Err(Error::malformed_target(format!(
                            "{} requires a locator",
                            self.intent_type
                        )))
                    }
                }
            }
            TargetScope::Sheet => {
                if self.target.sub_resource_id.is_none() {
                    return Err(Error::malformed_target(format!(
                        "{} requires subResourceId",
                        self.intent_type
                    )));
                }
            }
            TargetScope::Spreadsheet => {}
        }
        for key in self.intent_type.required_payload_keys() {
            if !self.payload.contains_key(*key) {
                return Err(Error::InvalidIntent {
                    reason: format!("{} payload is missing '{}'", self.intent_type, key),
                });
            }
        }
        Ok(())
    }

    /// Stamp the owning transaction id into the metadata
    pub fn into_queued(mut self, transaction_id: TransactionId) -> Self {
        self.metadata.transaction_id = Some(transaction_id);
        self
    }
}

/// Fluent construction of an [`Intent`]
#[derive(Debug, Clone)]
pub struct IntentBuilder {
    intent_type: IntentType,
    target: Target,
    payload: Value,
    metadata: IntentMetadata,
}

impl IntentBuilder {
    /// Builder for `intent_type` at `target`
    pub fn new(intent_type: IntentType, target: Target) -> Self {
        Self {
            intent_type,
            target,
            payload: Value::Object(Map::new()),
            metadata: IntentMetadata::default(),
        }
    }

    /// Replace the payload; must be a JSON object
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Set one payload field
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Value::Object(map) = &mut self.payload {
            map.insert(key.into(), value);
        }
        self
    }

    /// Replace all metadata
    pub fn metadata(mut self, metadata: IntentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Record the originating tool and action
    pub fn origin(mut self, tool: impl Into<String>, action: impl Into<String>) -> Self {
        self.metadata.origin_tool = tool.into();
        self.metadata.origin_action = action.into();
        self
    }

    /// Set the priority
    pub fn priority(mut self, priority: i32) -> Self {
        self.metadata.priority = priority;
        self
    }

    /// Flag as destructive; a destructive type cannot be unflagged
    pub fn destructive(mut self, destructive: bool) -> Self {
        self.metadata.destructive = destructive;
        self
    }

    /// Caller estimate of cells touched
    pub fn estimated_cells(mut self, cells: u64) -> Self {
        self.metadata.estimated_cells_affected = Some(cells);
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<Intent> {
        let Value::Object(payload) = self.payload else {
            return Err(Error::InvalidIntent {
                reason: format!("{} payload must be a JSON object", self.intent_type),
            });
        };
        let mut metadata = self.metadata;
        metadata.destructive |= self.intent_type.is_destructive();

        let intent = Intent {
            id: IntentId::new(),
            intent_type: self.intent_type,
            target: self.target,
            payload,
            metadata,
        };
        intent.validate()?;
        Ok(intent)
    }
}
