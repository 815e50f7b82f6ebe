//! Intent → request object translation
//!
//! Each intent compiles to exactly one request object. The caller's payload
//! is the starting body; addressing (`sheetId`, `range`) and type-specific
//! defaults are filled in only where the caller did not supply the key.

use gridtxn_core::a1;
use gridtxn_core::{Intent, IntentType, RemoteRequest, Result, Target};
use serde_json::{json, Map, Value};

/// Translate one intent into its request object
///
/// # Errors
/// Re-validates the intent, so a malformed target fails here.
pub fn translate(intent: &Intent) -> Result<RemoteRequest> {
    use IntentType::*;

    intent.validate()?;
    let target = intent.target();
    let mut body = intent.payload().clone();

    match intent.intent_type() {
        SetValues => {
            put(&mut body, "range", grid_range(target));
            values_to_rows(&mut body);
            put(&mut body, "fields", json!("userEnteredValue"));
        }
        ClearValues => {
            put(&mut body, "range", grid_range(target));
            put(&mut body, "fields", json!("userEnteredValue"));
        }
        AppendRows => {
            put_sheet_id(&mut body, target);
            values_to_rows(&mut body);
            put(&mut body, "fields", json!("userEnteredValue"));
        }
        InsertRows | DeleteRows => dimension_range(&mut body, target, "ROWS"),
        InsertColumns | DeleteColumns => dimension_range(&mut body, target, "COLUMNS"),
        AddSheet => {
            if !body.contains_key("properties") {
                let mut properties = Map::new();
                for key in ["title", "index", "gridProperties", "sheetId"] {
                    if let Some(v) = body.remove(key) {
                        properties.insert(key.to_string(), v);
                    }
                }
                body.insert("properties".into(), Value::Object(properties));
            }
        }
        DeleteSheet => put_sheet_id(&mut body, target),
        DuplicateSheet => {
            if let Some(id) = target.sub_resource_id {
                put(&mut body, "sourceSheetId", json!(id));
            }
        }
        RenameSheet => {
            if !body.contains_key("properties") {
                let title = body.remove("title").unwrap_or(Value::Null);
                body.insert(
                    "properties".into(),
                    json!({ "sheetId": target.sub_resource_id, "title": title }),
                );
            }
            put(&mut body, "fields", json!("title"));
        }
        SortRange | UnmergeCells | SetBorders | SetDataValidation | ClearDataValidation => {
            put(&mut body, "range", grid_range(target));
        }
        AutoResize => {
            let dimension = body.remove("dimension").unwrap_or_else(|| json!("COLUMNS"));
            let mut dims = Map::new();
            dims.insert("sheetId".into(), json!(target.sub_resource_id));
            dims.insert("dimension".into(), dimension);
            for key in ["startIndex", "endIndex"] {
                if let Some(v) = body.remove(key) {
                    dims.insert(key.to_string(), v);
                }
            }
            put(&mut body, "dimensions", Value::Object(dims));
        }
        FormatCells => {
            put(&mut body, "range", grid_range(target));
            if !body.contains_key("cell") {
                let format = body.remove("format").unwrap_or_else(|| json!({}));
                body.insert("cell".into(), json!({ "userEnteredFormat": format }));
            }
            put(&mut body, "fields", json!("userEnteredFormat"));
        }
        MergeCells => {
            put(&mut body, "range", grid_range(target));
            put(&mut body, "mergeType", json!("MERGE_ALL"));
        }
        AddConditionalFormat => {
            if let Some(Value::Object(rule)) = body.get_mut("rule") {
                if !rule.contains_key("ranges") {
                    rule.insert("ranges".into(), json!([grid_range(target)]));
                }
            }
            put(&mut body, "index", json!(0));
        }
        DeleteConditionalFormat => put_sheet_id(&mut body, target),
        AddChart => {
            if !body.contains_key("chart") {
                let spec = body.remove("spec").unwrap_or_else(|| json!({}));
                let position = body
                    .remove("position")
                    .unwrap_or_else(|| json!({ "sheetId": target.sub_resource_id }));
                body.insert("chart".into(), json!({ "spec": spec, "position": position }));
            }
        }
        UpdateChart | DeleteChart | DeleteFilterView | DeleteNamedRange
        | DeleteProtectedRange => {}
        SetBasicFilter => wrap_with_range(&mut body, target, "filter"),
        ClearBasicFilter => put_sheet_id(&mut body, target),
        AddFilterView => wrap_with_range(&mut body, target, "filter"),
        AddNamedRange => wrap_with_range(&mut body, target, "namedRange"),
        AddProtectedRange => wrap_with_range(&mut body, target, "protectedRange"),
        UpdateSpreadsheetProperties => {
            if let Some(Value::Object(props)) = body.get("properties") {
                let fields: Vec<&str> = props.keys().map(String::as_str).collect();
                let fields = fields.join(",");
                put(&mut body, "fields", json!(fields));
            }
        }
        CutPaste | CopyPaste => {
            put(&mut body, "source", grid_range(target));
            put(&mut body, "pasteType", json!("PASTE_NORMAL"));
        }
        FindReplace => match target.sub_resource_id {
            Some(id) => put(&mut body, "sheetId", json!(id)),
            None => put(&mut body, "allSheets", json!(true)),
        },
    }

    Ok(RemoteRequest::new(intent.intent_type().request_kind(), body))
}

/// Insert `value` under `key` unless the caller already set it
fn put(body: &mut Map<String, Value>, key: &str, value: Value) {
    body.entry(key.to_string()).or_insert(value);
}

fn put_sheet_id(body: &mut Map<String, Value>, target: &Target) {
    if let Some(id) = target.sub_resource_id {
        put(body, "sheetId", json!(id));
    }
}

/// Grid range object for the target
///
/// Closed A1 ranges become grid indices; anything the A1 parser does not
/// understand is passed through as `a1`.
pub fn grid_range(target: &Target) -> Value {
    let mut range = Map::new();
    if let Some(id) = target.sub_resource_id {
        range.insert("sheetId".into(), json!(id));
    }
    if let Some(locator) = target.locator.as_deref() {
        match a1::parse_range(locator) {
            Some(g) => {
                range.insert("startRowIndex".into(), json!(g.start_row_index));
                range.insert("endRowIndex".into(), json!(g.end_row_index));
                range.insert("startColumnIndex".into(), json!(g.start_column_index));
                range.insert("endColumnIndex".into(), json!(g.end_column_index));
            }
            None => {
                range.insert("a1".into(), json!(locator));
            }
        }
    }
    Value::Object(range)
}

fn dimension_range(body: &mut Map<String, Value>, target: &Target, dimension: &str) {
    if body.contains_key("range") {
        return;
    }
    let mut range = Map::new();
    range.insert("sheetId".into(), json!(target.sub_resource_id));
    range.insert("dimension".into(), json!(dimension));
    for key in ["startIndex", "endIndex"] {
        if let Some(v) = body.remove(key) {
            range.insert(key.to_string(), v);
        }
    }
    body.insert("range".into(), Value::Object(range));
}

fn wrap_with_range(body: &mut Map<String, Value>, target: &Target, wrapper: &str) {
    if body.contains_key(wrapper) {
        return;
    }
    let mut inner = std::mem::take(body);
    inner
        .entry("range".to_string())
        .or_insert_with(|| grid_range(target));
    body.insert(wrapper.to_string(), Value::Object(inner));
}

/// Replace a plain `values` matrix with `rows` of cell data
fn values_to_rows(body: &mut Map<String, Value>) {
    if body.contains_key("rows") {
        return;
    }
    let Some(values) = body.remove("values") else {
        return;
    };
    let rows: Vec<Value> = match values {
        Value::Array(rows) => rows
            .iter()
            .map(|row| {
                let cells: Vec<Value> = match row {
                    Value::Array(cells) => cells.iter().map(cell_data).collect(),
                    other => vec![cell_data(other)],
                };
                json!({ "values": cells })
            })
            .collect(),
        other => vec![json!({ "values": [cell_data(&other)] })],
    };
    body.insert("rows".into(), Value::Array(rows));
}

fn cell_data(value: &Value) -> Value {
    let entered = match value {
        Value::Null => return json!({}),
        Value::Bool(b) => json!({ "boolValue": b }),
        Value::Number(n) => json!({ "numberValue": n }),
        Value::String(s) if s.starts_with('=') => json!({ "formulaValue": s }),
        Value::String(s) => json!({ "stringValue": s }),
        other => json!({ "stringValue": other.to_string() }),
    };
    json!({ "userEnteredValue": entered })
}
