//! Export the visible rows of a [`ResultTable`]
//!
//! Every format emits exactly the visible columns, in canonical column order,
//! for the filtered and sorted row set (all pages).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ExportError, ExportResult};
use crate::table::{Cell, ResultTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Json, ExportFormat::Pdf];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Pdf => "pdf",
        }
    }

    /// File name used when writing to the export directory
    pub fn file_name(&self) -> String {
        format!("scan_result.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_uppercase())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Render the table in the given format
pub fn export_table(table: &ResultTable, format: ExportFormat) -> ExportResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => to_csv(table),
        ExportFormat::Json => to_json(table),
        ExportFormat::Pdf => to_pdf(table),
    }
}

/// Render the table and write it to `dir`, returning the written path
pub fn write_export(table: &ResultTable, format: ExportFormat, dir: &Path) -> ExportResult<PathBuf> {
    let bytes = export_table(table, format)?;
    let path = dir.join(format.file_name());
    std::fs::write(&path, bytes)?;
    debug!(path = %path.display(), %format, "wrote export");
    Ok(path)
}

fn to_csv(table: &ResultTable) -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.visible_columns().iter().map(|column| column.key()))?;
    for row in table.visible_cells() {
        writer.write_record(row.iter().map(Cell::display))?;
    }
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

fn to_json(table: &ResultTable) -> ExportResult<Vec<u8>> {
    let columns = table.visible_columns();
    let rows: Vec<Value> = table
        .visible_cells()
        .into_iter()
        .map(|cells| {
            let object: Map<String, Value> = columns
                .iter()
                .zip(cells)
                .map(|(column, cell)| (column.key().to_string(), cell.to_json()))
                .collect();
            Value::Object(object)
        })
        .collect();
    Ok(serde_json::to_vec_pretty(&rows)?)
}

// A4 landscape
const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 10.0;
const TITLE_SIZE: f32 = 14.0;
const TEXT_SIZE: f32 = 8.0;
const LINE_HEIGHT: f32 = 5.0;
// Rough Helvetica advance at TEXT_SIZE
const CHAR_WIDTH: f32 = 1.6;

struct PdfCursor {
    layer: PdfLayerReference,
    y: f32,
}

fn to_pdf(table: &ResultTable) -> ExportResult<Vec<u8>> {
    let title = table.title();
    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(format!("{:?}", e)))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Pdf(format!("{:?}", e)))?;

    let columns = table.visible_columns();
    let column_width = (PAGE_WIDTH - 2.0 * MARGIN) / columns.len().max(1) as f32;
    let max_chars = ((column_width / CHAR_WIDTH) as usize).max(1);
    let headers: Vec<String> = columns.iter().map(|c| c.header().to_string()).collect();

    let mut cursor = PdfCursor {
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT - MARGIN - 5.0,
    };
    cursor
        .layer
        .use_text(title.as_str(), TITLE_SIZE, Mm(MARGIN), Mm(cursor.y), &bold);
    cursor.y -= 2.0 * LINE_HEIGHT;
    write_pdf_row(&cursor, &headers, column_width, max_chars, &bold);
    cursor.y -= LINE_HEIGHT;

    for cells in table.visible_cells() {
        if cursor.y < MARGIN + LINE_HEIGHT {
            let (next_page, next_layer) =
                doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            cursor = PdfCursor {
                layer: doc.get_page(next_page).get_layer(next_layer),
                y: PAGE_HEIGHT - MARGIN - 5.0,
            };
            write_pdf_row(&cursor, &headers, column_width, max_chars, &bold);
            cursor.y -= LINE_HEIGHT;
        }
        let texts: Vec<String> = cells.iter().map(Cell::display).collect();
        write_pdf_row(&cursor, &texts, column_width, max_chars, &font);
        cursor.y -= LINE_HEIGHT;
    }

    doc.save_to_bytes()
        .map_err(|e| ExportError::Pdf(format!("{:?}", e)))
}

fn write_pdf_row(
    cursor: &PdfCursor,
    texts: &[String],
    column_width: f32,
    max_chars: usize,
    font: &IndirectFontRef,
) {
    for (i, text) in texts.iter().enumerate() {
        let x = MARGIN + i as f32 * column_width;
        cursor
            .layer
            .use_text(truncate(text, max_chars), TEXT_SIZE, Mm(x), Mm(cursor.y), font);
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    short.push('…');
    short
}
