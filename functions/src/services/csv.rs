//! Minimal CSV reader for dashboard uploads.
//!
//! Handles quoted fields (with `""` escapes, embedded commas and line breaks),
//! LF and CRLF line endings, a leading UTF-8 BOM and blank lines.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CsvError {
    #[error("Unterminated quoted field starting on line {0}")]
    UnterminatedQuote(usize),

    #[error("Unexpected character after closing quote on line {0}")]
    TrailingAfterQuote(usize),

    #[error("The file has no header row")]
    Empty,
}

/// A parsed record and the (1-based) line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub fields: Vec<String>,
}

pub fn parse(input: &str) -> Result<Vec<Record>, CsvError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut quote_line = 0usize;
    let mut in_quotes = false;
    let mut after_quote = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => {
                    in_quotes = false;
                    after_quote = true;
                }
                '\r' if chars.peek() == Some(&'\n') => {}
                '\n' | '\r' => {
                    line += 1;
                    field.push('\n');
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            ',' => {
                fields.push(std::mem::take(&mut field));
                after_quote = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                fields.push(std::mem::take(&mut field));
                push_record(&mut records, record_line, std::mem::take(&mut fields));
                after_quote = false;
                line += 1;
                record_line = line;
            }
            '"' if field.is_empty() && !after_quote => {
                in_quotes = true;
                quote_line = line;
            }
            _ if after_quote => {
                if !c.is_whitespace() {
                    return Err(CsvError::TrailingAfterQuote(line));
                }
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote(quote_line));
    }

    if !field.is_empty() || !fields.is_empty() || after_quote {
        fields.push(field);
        push_record(&mut records, record_line, fields);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<Record>, line: usize, fields: Vec<String>) {
    let blank = fields.iter().all(|f| f.trim().is_empty());
    if !blank {
        records.push(Record { line, fields });
    }
}

/// Canonical event columns an upload may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventColumn {
    Title,
    Description,
    Brand,
    Category,
    Location,
    StartTime,
    EndTime,
    Price,
    TicketUrl,
    ImageUrl,
}

impl EventColumn {
    pub const REQUIRED: [EventColumn; 4] = [
        EventColumn::Title,
        EventColumn::Brand,
        EventColumn::StartTime,
        EventColumn::EndTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventColumn::Title => "title",
            EventColumn::Description => "description",
            EventColumn::Brand => "brand",
            EventColumn::Category => "category",
            EventColumn::Location => "location",
            EventColumn::StartTime => "start_time",
            EventColumn::EndTime => "end_time",
            EventColumn::Price => "price",
            EventColumn::TicketUrl => "ticket_url",
            EventColumn::ImageUrl => "image_url",
        }
    }

    /// Map a header cell to a column: case, spaces and punctuation are ignored.
    pub fn from_header(header: &str) -> Option<Self> {
        let key: String = header
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        let column = match key.as_str() {
            "title" | "name" | "eventname" | "eventtitle" | "event" => EventColumn::Title,
            "description" | "desc" | "details" | "eventdescription" => EventColumn::Description,
            "brand" | "brandname" | "client" | "clientname" | "organizer" | "host" => {
                EventColumn::Brand
            }
            "category" | "categoryname" | "type" | "eventtype" => EventColumn::Category,
            "location" | "venue" | "address" | "place" => EventColumn::Location,
            "start" | "starttime" | "startdate" | "startdatetime" | "startsat" | "date" => {
                EventColumn::StartTime
            }
            "end" | "endtime" | "enddate" | "enddatetime" | "endsat" => EventColumn::EndTime,
            "price" | "cost" | "ticketprice" => EventColumn::Price,
            "ticketurl" | "ticketlink" | "tickets" | "link" | "url" => EventColumn::TicketUrl,
            "imageurl" | "image" | "imagelink" | "photo" | "poster" => EventColumn::ImageUrl,
            _ => return None,
        };
        Some(column)
    }
}

/// Column positions resolved from the header row. The first occurrence of a column wins.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    positions: HashMap<EventColumn, usize>,
}

impl HeaderMap {
    pub fn from_headers(headers: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(column) = EventColumn::from_header(header) {
                positions.entry(column).or_insert(idx);
            }
        }
        Self { positions }
    }

    pub fn missing_required(&self) -> Vec<EventColumn> {
        EventColumn::REQUIRED
            .into_iter()
            .filter(|c| !self.positions.contains_key(c))
            .collect()
    }

    /// Trimmed cell value, `None` when the column is absent or the cell is blank.
    pub fn get<'a>(&self, record: &'a Record, column: EventColumn) -> Option<&'a str> {
        self.positions
            .get(&column)
            .and_then(|&idx| record.fields.get(idx))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
