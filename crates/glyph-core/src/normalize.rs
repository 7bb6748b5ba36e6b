//! Payload normalizer: reshape a raw capability result into the layout its template expects.
//!
//! Every branch produces an object with a `rows` array and a non-empty `title`. Raw top-level keys
//! are kept. The canonical key always comes first in the row priority list, so running the
//! normalizer on its own output changes nothing.

use crate::signatures::{builtin, TemplateDescriptor};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

const ROWS: &str = "rows";
const TITLE: &str = "title";
const VALUE: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    RankedList,
    TickerDetail,
    MarketSnapshot,
    RoutineReport,
    RoutineInspector,
    TableExplorer,
    FilesystemListing,
    MediaGallery,
    WorkspaceOverview,
    TravelItinerary,
    MealPlan,
    PackageCatalog,
    Generic,
}

impl Shape {
    fn of(signature_id: &str) -> Self {
        match signature_id {
            builtin::RANKED_LIST => Shape::RankedList,
            builtin::TICKER_DETAIL => Shape::TickerDetail,
            builtin::MARKET_SNAPSHOT => Shape::MarketSnapshot,
            builtin::ROUTINE_REPORT => Shape::RoutineReport,
            builtin::ROUTINE_INSPECTOR => Shape::RoutineInspector,
            builtin::TABLE_EXPLORER => Shape::TableExplorer,
            builtin::FILESYSTEM_LISTING => Shape::FilesystemListing,
            builtin::MEDIA_GALLERY => Shape::MediaGallery,
            builtin::WORKSPACE_OVERVIEW => Shape::WorkspaceOverview,
            builtin::TRAVEL_ITINERARY => Shape::TravelItinerary,
            builtin::MEAL_PLAN => Shape::MealPlan,
            builtin::PACKAGE_CATALOG => Shape::PackageCatalog,
            _ => Shape::Generic,
        }
    }

    fn row_keys(self) -> &'static [&'static str] {
        match self {
            Shape::RankedList => &["rows", "top_picks", "picks", "predictions", "results"],
            Shape::TickerDetail => &["rows", "single_ticker_data", "data"],
            Shape::MarketSnapshot => &["rows", "indicators", "signals"],
            Shape::RoutineReport | Shape::RoutineInspector => &["rows", "steps"],
            Shape::TableExplorer => &["rows", "data", "records"],
            Shape::FilesystemListing => &["rows", "items", "entries", "files", "children"],
            Shape::MediaGallery => &["rows", "gallery", "media", "items", "results"],
            Shape::WorkspaceOverview => &["rows", "projects", "items"],
            Shape::TravelItinerary => &["rows", "itinerary", "days", "stops", "attractions"],
            Shape::MealPlan => &["rows", "meals", "recipes", "plan"],
            Shape::PackageCatalog => &["rows", "packages", "skills", "results", "items"],
            Shape::Generic => &["rows", "items", "results", "records"],
        }
    }

    /// Keys whose object value counts as a single row.
    fn object_row_keys(self) -> &'static [&'static str] {
        match self {
            Shape::TickerDetail => &["single_ticker_data"],
            _ => &[],
        }
    }

    fn fill_secondaries(self, out: &mut Map<String, Value>) {
        match self {
            Shape::RankedList | Shape::TableExplorer => {
                if !out.get("columns").is_some_and(Value::is_array) {
                    let columns = derived_columns(out);
                    out.insert("columns".into(), columns);
                }
            }
            Shape::TickerDetail => {
                if let Some(ticker) = ticker_of(out) {
                    out.insert("ticker".into(), Value::String(ticker));
                }
            }
            Shape::MarketSnapshot => {
                let regime = string_field(out, &["regime"]).unwrap_or_else(|| "unknown".to_string());
                out.insert("regime".into(), Value::String(regime));
                let confidence = ["regimeConfidence", "regime_confidence", "confidence"]
                    .iter()
                    .find_map(|k| match out.get(*k) {
                        Some(Value::Number(n)) => Some(n.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| Number::from(0));
                out.insert("regimeConfidence".into(), Value::Number(confidence));
            }
            Shape::RoutineReport => {
                let status = string_field(out, &["status"]).unwrap_or_else(|| "unknown".to_string());
                out.insert("status".into(), Value::String(status));
            }
            Shape::RoutineInspector => {
                let logs = first_array(out, &["logs", "log_lines"]).unwrap_or_default();
                out.insert("logs".into(), Value::Array(logs));
                let failure = out
                    .get("failure")
                    .filter(|v| v.is_object())
                    .cloned()
                    .unwrap_or(Value::Null);
                out.insert("failure".into(), failure);
            }
            Shape::FilesystemListing => {
                if let Some(path) = string_field(out, &["path", "cwd", "directory"]) {
                    out.insert("path".into(), Value::String(path));
                }
            }
            Shape::MediaGallery => {
                let categories = first_array(out, &["categories"])
                    .unwrap_or_else(|| distinct_row_strings(out, "category"));
                out.insert("categories".into(), Value::Array(categories));
            }
            Shape::WorkspaceOverview => {
                let groups = first_array(out, &["groups", "sections"]).unwrap_or_default();
                out.insert("groups".into(), Value::Array(groups));
            }
            Shape::TravelItinerary => {
                if let Some(city) = string_field(out, &["city", "destination"]) {
                    out.insert("city".into(), Value::String(city));
                }
            }
            Shape::MealPlan => {
                let groups = first_array(out, &["groups", "days"]).unwrap_or_default();
                out.insert("groups".into(), Value::Array(groups));
            }
            Shape::PackageCatalog => {
                let categories = first_array(out, &["categories", "tags"]).unwrap_or_default();
                out.insert("categories".into(), Value::Array(categories));
            }
            Shape::Generic => {}
        }
    }

    fn default_title(self, out: &Map<String, Value>) -> String {
        match self {
            Shape::RankedList => "Top Picks".to_string(),
            Shape::TickerDetail => match string_field(out, &["ticker"]) {
                Some(t) => format!("{} Detail", t.to_uppercase()),
                None => "Ticker Detail".to_string(),
            },
            Shape::MarketSnapshot => "Market Regime".to_string(),
            Shape::RoutineReport => "Routine Report".to_string(),
            Shape::RoutineInspector => "Routine Inspector".to_string(),
            Shape::TableExplorer => "Table Explorer".to_string(),
            Shape::FilesystemListing => string_field(out, &["path"]).unwrap_or_else(|| "Files".to_string()),
            Shape::MediaGallery => "Media Library".to_string(),
            Shape::WorkspaceOverview => "Workspace".to_string(),
            Shape::TravelItinerary => match string_field(out, &["city"]) {
                Some(city) => format!("Trip to {}", city),
                None => "Travel Plan".to_string(),
            },
            Shape::MealPlan => "Meal Plan".to_string(),
            Shape::PackageCatalog => "Packages".to_string(),
            Shape::Generic => "Results".to_string(),
        }
    }
}

/// Reshape `raw` for the template named by `descriptor`. Never fails.
pub fn normalize(descriptor: &TemplateDescriptor, raw: &Value) -> Value {
    let shape = Shape::of(&descriptor.signature_id);
    let mut out = match raw {
        Value::Object(map) => map.clone(),
        Value::Array(items) => {
            let mut map = Map::new();
            map.insert(ROWS.into(), Value::Array(items.clone()));
            map
        }
        scalar => {
            let mut map = Map::new();
            map.insert(VALUE.into(), scalar.clone());
            map
        }
    };

    let rows = pick_rows(&out, shape);
    out.insert(ROWS.into(), Value::Array(rows));
    shape.fill_secondaries(&mut out);

    let has_title = out
        .get(TITLE)
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty());
    if !has_title {
        let title = shape.default_title(&out);
        out.insert(TITLE.into(), Value::String(title));
    }
    Value::Object(out)
}

fn pick_rows(out: &Map<String, Value>, shape: Shape) -> Vec<Value> {
    for key in shape.row_keys() {
        match out.get(*key) {
            Some(Value::Array(items)) => return items.clone(),
            Some(obj @ Value::Object(_)) if shape.object_row_keys().contains(key) => {
                return vec![obj.clone()];
            }
            _ => {}
        }
    }
    Vec::new()
}

fn first_array(out: &Map<String, Value>, keys: &[&str]) -> Option<Vec<Value>> {
    keys.iter()
        .find_map(|k| out.get(*k).and_then(Value::as_array))
        .cloned()
}

fn string_field(out: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| out.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn rows_of(out: &Map<String, Value>) -> &[Value] {
    out.get(ROWS)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn derived_columns(out: &Map<String, Value>) -> Value {
    let columns = rows_of(out)
        .first()
        .and_then(Value::as_object)
        .map(|row| row.keys().cloned().map(Value::String).collect())
        .unwrap_or_default();
    Value::Array(columns)
}

fn ticker_of(out: &Map<String, Value>) -> Option<String> {
    string_field(out, &["ticker", "symbol"]).or_else(|| {
        rows_of(out)
            .first()
            .and_then(Value::as_object)
            .and_then(|row| string_field(row, &["ticker", "symbol"]))
    })
}

fn distinct_row_strings(out: &Map<String, Value>, key: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    rows_of(out)
        .iter()
        .filter_map(|row| row.get(key).and_then(Value::as_str))
        .filter(|s| seen.insert(s.to_string()))
        .map(|s| Value::String(s.to_string()))
        .collect()
}
