use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{CategoryRepository, ClientRepository, CreateEvent, EventRepository};
use crate::error::{AppError, AppErrorWithDetails};
use crate::services::csv::{self, CsvError, EventColumn, HeaderMap, Record};
use crate::AppState;

/// Reasons an upload is rejected as a whole, before any row is processed.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Malformed CSV: {0}")]
    Csv(#[from] CsvError),

    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

impl From<ImportError> for AppErrorWithDetails {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::MissingColumns(ref missing) => {
                let details = serde_json::json!({ "missingColumns": missing });
                AppError::Validation(err.to_string()).with_details(details)
            }
            ImportError::Csv(_) => AppError::BadRequest(err.to_string()).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowError {
    /// Line of the upload the row starts on (the header is line 1).
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: bool,
    pub total_rows: usize,
    pub created: usize,
    pub failed: usize,
    pub event_ids: Vec<String>,
    pub errors: Vec<RowError>,
}

/// Row values after validation, before brand/category resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub title: String,
    pub description: String,
    pub brand: String,
    pub category: Option<String>,
    pub location: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub price: Option<f64>,
    pub ticket_url: Option<String>,
    pub image_url: Option<String>,
}

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Parse an upload timestamp as UTC. A bare date means midnight.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn parse_price(value: &str) -> Result<f64, String> {
    let cleaned = value.trim().trim_start_matches('$').replace(',', "");
    if cleaned.eq_ignore_ascii_case("free") {
        return Ok(0.0);
    }
    match cleaned.parse::<f64>() {
        Ok(p) if p.is_finite() && p >= 0.0 => Ok(p),
        _ => Err(format!("Invalid price '{}'", value.trim())),
    }
}

/// Validate one record into an `EventRow`.
pub fn read_row(headers: &HeaderMap, record: &Record) -> Result<EventRow, String> {
    let required = |column: EventColumn| {
        headers
            .get(record, column)
            .ok_or_else(|| format!("Missing value for {}", column.as_str()))
    };

    let title = required(EventColumn::Title)?;
    let brand = required(EventColumn::Brand)?;
    let start_raw = required(EventColumn::StartTime)?;
    let end_raw = required(EventColumn::EndTime)?;

    let start_time = parse_datetime(start_raw)
        .ok_or_else(|| format!("Invalid start_time '{}'", start_raw))?;
    let end_time =
        parse_datetime(end_raw).ok_or_else(|| format!("Invalid end_time '{}'", end_raw))?;
    if end_time < start_time {
        return Err("end_time is before start_time".to_string());
    }

    let price = headers
        .get(record, EventColumn::Price)
        .map(parse_price)
        .transpose()?;

    let optional = |column: EventColumn| headers.get(record, column).map(str::to_string);

    Ok(EventRow {
        title: title.to_string(),
        description: optional(EventColumn::Description).unwrap_or_default(),
        brand: brand.to_string(),
        category: optional(EventColumn::Category),
        location: optional(EventColumn::Location).unwrap_or_default(),
        start_time,
        end_time,
        price,
        ticket_url: optional(EventColumn::TicketUrl),
        image_url: optional(EventColumn::ImageUrl),
    })
}

/// Bulk-creates events from an uploaded CSV; each row succeeds or fails on its own.
pub struct EventImporter {
    pool: SqlitePool,
}

impl EventImporter {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self::from_pool(state.db.clone())
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn import(&self, input: &str) -> Result<ImportReport, ImportError> {
        let mut records = csv::parse(input)?.into_iter();
        let header = records.next().ok_or(CsvError::Empty)?;
        let headers = HeaderMap::from_headers(&header.fields);

        let missing = headers.missing_required();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(
                missing.iter().map(|c| c.as_str().to_string()).collect(),
            ));
        }

        let mut report = ImportReport::default();

        for record in records {
            report.total_rows += 1;
            match self.import_row(&headers, &record).await {
                Ok(event_id) => {
                    report.created += 1;
                    report.event_ids.push(event_id);
                }
                Err(message) => {
                    tracing::warn!("Import row {} failed: {}", record.line, message);
                    report.failed += 1;
                    report.errors.push(RowError {
                        row: record.line,
                        message,
                    });
                }
            }
        }

        report.success = report.failed == 0;
        tracing::info!(
            "Event import finished: {} created, {} failed",
            report.created,
            report.failed
        );
        Ok(report)
    }

    async fn import_row(&self, headers: &HeaderMap, record: &Record) -> Result<String, String> {
        let row = read_row(headers, record)?;

        let client = ClientRepository::find_by_name(&self.pool, &row.brand)
            .await
            .map_err(|e| format!("Brand lookup failed: {}", e))?
            .ok_or_else(|| format!("Brand '{}' not found", row.brand))?;

        let category_id = match row.category.as_deref() {
            Some(name) => Some(
                CategoryRepository::find_by_name(&self.pool, name)
                    .await
                    .map_err(|e| format!("Category lookup failed: {}", e))?
                    .ok_or_else(|| format!("Category '{}' not found", name))?
                    .id,
            ),
            None => None,
        };

        let event = EventRepository::create(
            &self.pool,
            CreateEvent {
                title: row.title,
                description: row.description,
                client_id: client.id,
                category_id,
                location: row.location,
                start_time: row.start_time,
                end_time: row.end_time,
                price: row.price,
                ticket_url: row.ticket_url,
                image_url: row.image_url,
            },
        )
        .await
        .map_err(|e| format!("Failed to create event: {}", e))?;

        Ok(event.id)
    }
}
