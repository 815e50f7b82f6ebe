//! In-memory spreadsheet for tests
//!
//! [`MemorySheet`] implements all three collaborator traits over a tiny
//! model of a spreadsheet (sheet ids → dimensions and values). It records
//! every call and can be told to fail specific ones.
//!
//! Applied effects are shallow: sheet add/delete, dimension
//! insert/delete and row appends change the model; every other request is
//! accepted and replies with an empty object, as the real endpoint does.

use async_trait::async_trait;
use chrono::Utc;
use gridtxn_core::a1;
use gridtxn_core::{
    BatchEndpoint, Error, FingerprintScope, GridState, RemoteError, RemoteErrorKind,
    RemoteRequest, RequestKind, ResourceId, Result, Snapshot, SnapshotId, SnapshotService,
    StateReader,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

type Sheets = BTreeMap<i64, GridState>;

#[derive(Default)]
struct SheetState {
    sheets: Sheets,
    batch_calls: Vec<(ResourceId, Vec<RemoteRequest>)>,
    fail_on_call: Option<(usize, RemoteError)>,
    call_delay: Option<Duration>,
    snapshots: HashMap<SnapshotId, Sheets>,
    snapshots_created: usize,
    restores: Vec<SnapshotId>,
    fail_snapshots: bool,
    fail_restore: bool,
    reads: usize,
}

/// In-memory spreadsheet implementing every collaborator trait
#[derive(Default)]
pub struct MemorySheet {
    state: Mutex<SheetState>,
}

impl MemorySheet {
    /// One sheet (id 0) of `rows` × `columns` with no values
    pub fn new(rows: u64, columns: u64) -> Self {
        let sheet = MemorySheet::default();
        sheet.state.lock().sheets.insert(
            0,
            GridState {
                row_count: rows,
                column_count: columns,
                values: Vec::new(),
            },
        );
        sheet
    }

    /// Replace the values of sheet `sheet_id` (creating it if needed)
    pub fn set_values(&self, sheet_id: i64, values: Vec<Vec<String>>) {
        let mut state = self.state.lock();
        let sheet = state.sheets.entry(sheet_id).or_default();
        sheet.row_count = sheet.row_count.max(values.len() as u64);
        let width = values.iter().map(Vec::len).max().unwrap_or(0) as u64;
        sheet.column_count = sheet.column_count.max(width);
        sheet.values = values;
    }

    /// Change a sheet's row count behind the engine's back
    pub fn set_row_count(&self, sheet_id: i64, rows: u64) {
        self.state.lock().sheets.entry(sheet_id).or_default().row_count = rows;
    }

    /// Fail the `n`th batch call (1-based) with `error`
    pub fn fail_on_call(&self, n: usize, error: RemoteError) {
        self.state.lock().fail_on_call = Some((n, error));
    }

    /// Hold every batch call for `delay` before applying it
    pub fn delay_calls(&self, delay: Duration) {
        self.state.lock().call_delay = Some(delay);
    }

    /// Make snapshot creation fail
    pub fn fail_snapshots(&self, fail: bool) {
        self.state.lock().fail_snapshots = fail;
    }

    /// Make snapshot restore fail
    pub fn fail_restore(&self, fail: bool) {
        self.state.lock().fail_restore = fail;
    }

    /// Every batch call received, including failed ones
    pub fn batch_calls(&self) -> Vec<Vec<RemoteRequest>> {
        self.state
            .lock()
            .batch_calls
            .iter()
            .map(|(_, reqs)| reqs.clone())
            .collect()
    }

    /// Number of batch calls received
    pub fn batch_call_count(&self) -> usize {
        self.state.lock().batch_calls.len()
    }

    /// Number of snapshots created
    pub fn snapshot_count(&self) -> usize {
        self.state.lock().snapshots_created
    }

    /// Snapshot ids passed to `restore_snapshot`, in order
    pub fn restores(&self) -> Vec<SnapshotId> {
        self.state.lock().restores.clone()
    }

    /// Number of `read_state` calls
    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Current row count of a sheet
    pub fn row_count(&self, sheet_id: i64) -> Option<u64> {
        self.state.lock().sheets.get(&sheet_id).map(|s| s.row_count)
    }

    /// Ids of existing sheets
    pub fn sheet_ids(&self) -> Vec<i64> {
        self.state.lock().sheets.keys().copied().collect()
    }
}

fn index(body: &Map<String, Value>, key: &str) -> u64 {
    body.get("range")
        .and_then(|r| r.get(key))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn apply(sheets: &mut Sheets, request: &RemoteRequest) -> Value {
    let body = request.body();
    let sheet_id = body
        .get("sheetId")
        .or_else(|| body.get("range").and_then(|r| r.get("sheetId")))
        .and_then(Value::as_i64)
        .unwrap_or(0);

    match request.kind() {
        RequestKind::AddSheet => {
            let props = body.get("properties").cloned().unwrap_or_else(|| json!({}));
            let id = props
                .get("sheetId")
                .and_then(Value::as_i64)
                .unwrap_or_else(|| sheets.keys().next_back().map_or(0, |k| k + 1));
            let grid = props.get("gridProperties");
            let rows = grid.and_then(|g| g.get("rowCount")).and_then(Value::as_u64).unwrap_or(1000);
            let columns = grid
                .and_then(|g| g.get("columnCount"))
                .and_then(Value::as_u64)
                .unwrap_or(26);
            sheets.insert(
                id,
                GridState {
                    row_count: rows,
                    column_count: columns,
                    values: Vec::new(),
                },
            );
            let title = props.get("title").cloned().unwrap_or_else(|| json!(format!("Sheet{}", id)));
            json!({"addSheet": {"properties": {
                "sheetId": id,
                "title": title,
                "gridProperties": {"rowCount": rows, "columnCount": columns}
            }}})
        }
        RequestKind::DeleteSheet => {
            sheets.remove(&sheet_id);
            json!({})
        }
        RequestKind::InsertDimension | RequestKind::DeleteDimension => {
            let count = index(body, "endIndex").saturating_sub(index(body, "startIndex"));
            let columns = body
                .get("range")
                .and_then(|r| r.get("dimension"))
                .and_then(Value::as_str)
                == Some("COLUMNS");
            if let Some(sheet) = sheets.get_mut(&sheet_id) {
                let dim = if columns {
                    &mut sheet.column_count
                } else {
                    &mut sheet.row_count
                };
                *dim = if request.kind() == RequestKind::InsertDimension {
                    dim.saturating_add(count)
                } else {
                    dim.saturating_sub(count)
                };
            }
            json!({})
        }
        RequestKind::AppendCells => {
            let added = body.get("rows").and_then(Value::as_array).map_or(0, Vec::len) as u64;
            if let Some(sheet) = sheets.get_mut(&sheet_id) {
                sheet.row_count += added;
            }
            json!({})
        }
        _ => json!({}),
    }
}

#[async_trait]
impl BatchEndpoint for MemorySheet {
    async fn batch_update(
        &self,
        resource_id: &ResourceId,
        requests: &[RemoteRequest],
    ) -> std::result::Result<Vec<Value>, RemoteError> {
        let delay = self.state.lock().call_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.batch_calls.push((resource_id.clone(), requests.to_vec()));
        let call = state.batch_calls.len();
        if let Some((n, err)) = &state.fail_on_call {
            if *n == call {
                return Err(err.clone());
            }
        }

        // all-or-nothing within one call
        let mut staged = state.sheets.clone();
        let replies = requests.iter().map(|r| apply(&mut staged, r)).collect();
        state.sheets = staged;
        Ok(replies)
    }
}

#[async_trait]
impl SnapshotService for MemorySheet {
    async fn create_snapshot(&self, resource_id: &ResourceId) -> Result<Snapshot> {
        let mut state = self.state.lock();
        if state.fail_snapshots {
            return Err(Error::snapshot("snapshot service unavailable"));
        }
        state.snapshots_created += 1;
        let id = SnapshotId::new(format!("snap-{}", state.snapshots_created));
        let copy = state.sheets.clone();
        state.snapshots.insert(id.clone(), copy);
        Ok(Snapshot {
            id,
            resource_id: resource_id.clone(),
            captured_at: Utc::now(),
        })
    }

    async fn restore_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let mut state = self.state.lock();
        state.restores.push(snapshot.id.clone());
        if state.fail_restore {
            return Err(Error::snapshot("restore rejected"));
        }
        let sheets = state
            .snapshots
            .get(&snapshot.id)
            .cloned()
            .ok_or_else(|| Error::snapshot(format!("unknown snapshot {}", snapshot.id)))?;
        state.sheets = sheets;
        Ok(())
    }
}

#[async_trait]
impl StateReader for MemorySheet {
    async fn read_state(&self, _resource_id: &ResourceId, scope: &FingerprintScope) -> Result<GridState> {
        let mut state = self.state.lock();
        state.reads += 1;
        let sheet_id = match scope.sub_resource_id {
            Some(id) => id,
            None => state.sheets.keys().next().copied().unwrap_or(0),
        };
        let sheet = state.sheets.get(&sheet_id).ok_or_else(|| {
            Error::from(RemoteError::new(
                RemoteErrorKind::NotFound,
                format!("sheet {} not found", sheet_id),
            ))
        })?;

        let mut out = sheet.clone();
        if let Some(range) = scope.range.as_deref().and_then(a1::parse_range) {
            out.values = sheet
                .values
                .iter()
                .skip(range.start_row_index as usize)
                .take(range.rows() as usize)
                .map(|row| {
                    row.iter()
                        .skip(range.start_column_index as usize)
                        .take(range.columns() as usize)
                        .cloned()
                        .collect()
                })
                .collect();
        }
        Ok(out)
    }
}
