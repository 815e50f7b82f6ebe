//! Response metadata parsing
//!
//! The batch endpoint returns one reply per request, but only a handful of
//! request kinds put anything in theirs. Each kind maps to an [`Extractor`];
//! kinds without one, and replies whose body is empty, fall back to a
//! generic "succeeded" record named after the originating request. The
//! fallback is the common case, not an error.
//!
//! Everything here is pure: no I/O, no shared state.

use gridtxn_core::RequestKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of an object created by a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    /// Numeric id (sheets, charts, filter views, protected ranges)
    Int(i64),
    /// String id (named ranges)
    Str(String),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Int(i) => write!(f, "{}", i),
            ObjectId::Str(s) => f.write_str(s),
        }
    }
}

/// Canonical metadata for one reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMetadata {
    /// Wire key of the request that produced the reply
    pub request_type: String,
    /// Whether the request applied
    pub success: bool,
    /// Cells touched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells_affected: Option<u64>,
    /// Rows touched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// Columns touched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns_affected: Option<u64>,
    /// Ids of created objects, keyed by id field name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub object_ids: BTreeMap<String, ObjectId>,
    /// Human-readable description
    pub summary: String,
}

impl ReplyMetadata {
    fn succeeded(request_type: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            request_type: request_type.into(),
            success: true,
            cells_affected: None,
            rows_affected: None,
            columns_affected: None,
            object_ids: BTreeMap::new(),
            summary: summary.into(),
        }
    }

    /// Generic record for replies with nothing to extract
    pub fn generic(request_type: &str) -> Self {
        Self::succeeded(request_type, format!("{} succeeded", request_type))
    }
}

/// Type-specific reply extractors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// `addSheet`: new sheet properties
    AddSheet,
    /// `duplicateSheet`: copied sheet properties
    DuplicateSheet,
    /// `addChart`: chart id
    AddChart,
    /// `addNamedRange`: named range id
    AddNamedRange,
    /// `addFilterView`: filter view id
    AddFilterView,
    /// `addProtectedRange`: protected range id
    AddProtectedRange,
    /// `findReplace`: change counters
    FindReplace,
    /// `updateCells` / `appendCells`: updated cell counters, when present
    CellUpdate,
    /// Everything else
    Generic,
}

impl Extractor {
    /// Extractor registered for `kind`
    pub fn for_kind(kind: RequestKind) -> Self {
        match kind {
            RequestKind::AddSheet => Extractor::AddSheet,
            RequestKind::DuplicateSheet => Extractor::DuplicateSheet,
            RequestKind::AddChart => Extractor::AddChart,
            RequestKind::AddNamedRange => Extractor::AddNamedRange,
            RequestKind::AddFilterView => Extractor::AddFilterView,
            RequestKind::AddProtectedRange => Extractor::AddProtectedRange,
            RequestKind::FindReplace => Extractor::FindReplace,
            RequestKind::UpdateCells | RequestKind::AppendCells => Extractor::CellUpdate,
            _ => Extractor::Generic,
        }
    }

    /// Extract metadata from a reply body
    ///
    /// Returns `None` when the body does not carry what this extractor
    /// looks for; the caller then uses the generic record.
    fn extract(self, kind: &str, body: &Map<String, Value>) -> Option<ReplyMetadata> {
        match self {
            Extractor::AddSheet => sheet_properties(kind, body, "Created"),
            Extractor::DuplicateSheet => sheet_properties(kind, body, "Duplicated"),
            Extractor::AddChart => {
                let id = body.get("chart")?.get("chartId").and_then(Value::as_i64)?;
                Some(created(kind, "chartId", ObjectId::Int(id), format!("Created chart {}", id)))
            }
            Extractor::AddNamedRange => {
                let named = body.get("namedRange")?;
                let id = object_id(named.get("namedRangeId")?)?;
                let name = named.get("name").and_then(Value::as_str).unwrap_or("");
                let summary = format!("Created named range '{}' ({})", name, id);
                Some(created(kind, "namedRangeId", id, summary))
            }
            Extractor::AddFilterView => {
                let id = body.get("filter")?.get("filterViewId").and_then(Value::as_i64)?;
                Some(created(
                    kind,
                    "filterViewId",
                    ObjectId::Int(id),
                    format!("Created filter view {}", id),
                ))
            }
            Extractor::AddProtectedRange => {
                let id = body
                    .get("protectedRange")?
                    .get("protectedRangeId")
                    .and_then(Value::as_i64)?;
                Some(created(
                    kind,
                    "protectedRangeId",
                    ObjectId::Int(id),
                    format!("Protected range {}", id),
                ))
            }
            Extractor::FindReplace => {
                let values = body.get("valuesChanged").and_then(Value::as_u64).unwrap_or(0);
                let rows = body.get("rowsChanged").and_then(Value::as_u64).unwrap_or(0);
                let sheets = body.get("sheetsChanged").and_then(Value::as_u64).unwrap_or(0);
                let mut meta = ReplyMetadata::succeeded(
                    kind,
                    format!(
                        "Replaced {} {} in {} {} across {} {}",
                        values,
                        plural(values, "value", "values"),
                        rows,
                        plural(rows, "row", "rows"),
                        sheets,
                        plural(sheets, "sheet", "sheets")
                    ),
                );
                meta.cells_affected = Some(values);
                meta.rows_affected = Some(rows);
                Some(meta)
            }
            Extractor::CellUpdate => {
                let cells = body.get("updatedCells").and_then(Value::as_u64);
                let rows = body.get("updatedRows").and_then(Value::as_u64);
                let columns = body.get("updatedColumns").and_then(Value::as_u64);
                if cells.is_none() && rows.is_none() && columns.is_none() {
                    return None;
                }
                let cells = cells.or_else(|| Some(rows?.saturating_mul(columns?)));
                let mut meta = ReplyMetadata::succeeded(
                    kind,
                    match cells {
                        Some(n) => format!("Updated {} {}", n, plural(n, "cell", "cells")),
                        None => "Updated cells".to_string(),
                    },
                );
                meta.cells_affected = cells;
                meta.rows_affected = rows;
                meta.columns_affected = columns;
                Some(meta)
            }
            Extractor::Generic => None,
        }
    }
}

fn plural<'a>(n: u64, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

fn object_id(value: &Value) -> Option<ObjectId> {
    match value {
        Value::Number(n) => n.as_i64().map(ObjectId::Int),
        Value::String(s) => Some(ObjectId::Str(s.clone())),
        _ => None,
    }
}

fn created(kind: &str, key: &str, id: ObjectId, summary: String) -> ReplyMetadata {
    let mut meta = ReplyMetadata::succeeded(kind, summary);
    meta.object_ids.insert(key.to_string(), id);
    meta
}

fn sheet_properties(kind: &str, body: &Map<String, Value>, verb: &str) -> Option<ReplyMetadata> {
    let props = body.get("properties")?;
    let id = props.get("sheetId").and_then(Value::as_i64)?;
    let title = props.get("title").and_then(Value::as_str).unwrap_or("");
    let grid = props.get("gridProperties");
    let rows = grid.and_then(|g| g.get("rowCount")).and_then(Value::as_u64);
    let columns = grid.and_then(|g| g.get("columnCount")).and_then(Value::as_u64);

    let summary = match (rows, columns) {
        (Some(r), Some(c)) => format!("{} sheet '{}' (id {}) with {}x{} grid", verb, title, id, r, c),
        _ => format!("{} sheet '{}' (id {})", verb, title, id),
    };
    let mut meta = created(kind, "sheetId", ObjectId::Int(id), summary);
    meta.rows_affected = rows;
    meta.columns_affected = columns;
    meta.cells_affected = rows.zip(columns).map(|(r, c)| r.saturating_mul(c));
    Some(meta)
}

/// Parse one reply
///
/// The reply's own key wins when it names a known request kind; otherwise
/// `kind` (the request that produced it) decides the extractor.
pub fn parse_reply(reply: &Value, kind: Option<RequestKind>) -> ReplyMetadata {
    let obj = reply.as_object();
    let keyed = obj.and_then(|o| {
        o.iter()
            .find_map(|(k, v)| RequestKind::from_key(k).map(|rk| (rk, v)))
    });

    let (kind, body) = match (keyed, kind) {
        (Some((rk, Value::Object(body))), _) => (Some(rk), Some(body)),
        (Some((rk, _)), _) => (Some(rk), None),
        (None, k) => (k, None),
    };

    let Some(kind) = kind else {
        let name = obj
            .and_then(|o| o.keys().next())
            .map(String::as_str)
            .unwrap_or("operation");
        return ReplyMetadata::generic(name);
    };

    body.and_then(|b| Extractor::for_kind(kind).extract(kind.as_str(), b))
        .unwrap_or_else(|| ReplyMetadata::generic(kind.as_str()))
}

/// Parse the replies of one call against the kinds that produced them
///
/// Missing replies are treated as empty; surplus replies are parsed by
/// their own key.
pub fn parse_replies(replies: &[Value], kinds: &[RequestKind]) -> Vec<ReplyMetadata> {
    let n = replies.len().max(kinds.len());
    let empty = Value::Object(Map::new());
    (0..n)
        .map(|i| parse_reply(replies.get(i).unwrap_or(&empty), kinds.get(i).copied()))
        .collect()
}

/// Aggregate over every reply of a commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySummary {
    /// Replies aggregated
    pub operations: usize,
    /// Replies that reported success
    pub succeeded: usize,
    /// Sum of `cells_affected`
    pub total_cells_affected: u64,
    /// Sum of `rows_affected`
    pub total_rows_affected: u64,
    /// Sum of `columns_affected`
    pub total_columns_affected: u64,
    /// Object ids from every reply; repeated keys get `#2`, `#3`, ...
    pub object_ids: BTreeMap<String, ObjectId>,
    /// Top-level description
    pub summary: String,
}

impl ReplySummary {
    /// Aggregate `replies`
    pub fn from_replies(replies: &[ReplyMetadata]) -> Self {
        let mut out = ReplySummary {
            operations: replies.len(),
            ..Self::default()
        };
        for reply in replies {
            if reply.success {
                out.succeeded += 1;
            }
            out.total_cells_affected = out
                .total_cells_affected
                .saturating_add(reply.cells_affected.unwrap_or(0));
            out.total_rows_affected = out
                .total_rows_affected
                .saturating_add(reply.rows_affected.unwrap_or(0));
            out.total_columns_affected = out
                .total_columns_affected
                .saturating_add(reply.columns_affected.unwrap_or(0));
            for (key, id) in &reply.object_ids {
                let mut slot = key.clone();
                let mut n = 1;
                while out.object_ids.contains_key(&slot) {
                    n += 1;
                    slot = format!("{}#{}", key, n);
                }
                out.object_ids.insert(slot, id.clone());
            }
        }

        out.summary = match replies {
            [] => "No operations executed".to_string(),
            [only] => only.summary.clone(),
            _ if out.total_cells_affected > 0 => format!(
                "Executed {} operations ({} cells affected)",
                out.operations, out.total_cells_affected
            ),
            _ => format!("Executed {} operations", out.operations),
        };
        out
    }
}
