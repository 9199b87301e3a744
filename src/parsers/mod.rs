//! One parser per deal-export family.
//!
//! Each parser is a [`SourceLayout`] (which sheets, how to find the header,
//! which columns map where) plus a record builder that validates required
//! fields and applies derivations. [`Ingestor`] runs a parser against an
//! uploaded file and writes the result with replace semantics.

pub mod fimmda;
pub mod im_deal;
pub mod mm_deal;
pub mod reference;
pub mod repo_deal;
pub mod slr_nds;

use crate::batch::{BatchId, ProcessingCounts};
use crate::coercion::Cell;
use crate::config::ReportConfig;
use crate::error::{ReportError, Result, RowError};
use crate::mapper::{find_header_row, flatten_row, is_empty_row, map_row, ColumnMapping, HeaderRule, MappedRow};
use crate::records::{CanonicalRecord, Field, SourceKind};
use crate::store::RecordStore;
use crate::workbook::{Sheet, SourceFile, Workbook};
use chrono::NaiveDate;
use log::{debug, info, warn};

pub use fimmda::FimmdaParser;
pub use im_deal::ImDealParser;
pub use mm_deal::{MmDealOutstandingParser, MmDealParser};
pub use reference::{GSecParser, SdlParser};
pub use repo_deal::{RepoDealOutstandingParser, RepoDealParser};
pub use slr_nds::SlrNdsParser;

/// How a source picks the sheets it reads.
#[derive(Debug, Clone, Copy)]
pub enum SheetSelection {
    /// First sheet found under any of these names. Required; when
    /// `fallback_first` is set the workbook's first sheet stands in.
    Named {
        names: &'static [&'static str],
        fallback_first: bool,
    },
    /// Each named sheet that exists. Missing sheets or headers are skipped.
    EachNamed(&'static [&'static str]),
    /// Every sheet whose name contains none of these words. Sheets without a
    /// header are skipped.
    AllExcept(&'static [&'static str]),
    /// The first sheet, header required.
    First,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceLayout {
    pub kind: SourceKind,
    pub sheets: SheetSelection,
    pub header: HeaderRule,
    pub columns: ColumnMapping,
    pub stops_at_end_marker: bool,
    /// Sheets this source leaves to another parser, judged on the sheet and
    /// its header row.
    pub skip_sheet: Option<fn(&Sheet, &[Cell]) -> bool>,
}

pub struct IngestContext<'a> {
    pub batch_id: &'a BatchId,
    /// Value date for sheets with no date column and no dated rows.
    pub as_of: NaiveDate,
    pub config: &'a ReportConfig,
}

/// Per-file values handed to a record builder.
pub struct FileContext<'a> {
    pub batch_id: &'a BatchId,
    pub sheet: &'a str,
    /// First value date seen anywhere in the file, else the ingest default.
    pub file_value_date: NaiveDate,
}

pub type RecordBuilder =
    fn(&MappedRow, &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError>;

#[derive(Debug, Clone, PartialEq)]
pub struct RowRejection {
    pub sheet: String,
    /// Zero-based row index within the sheet.
    pub row: usize,
    pub reason: RowError,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub records: Vec<CanonicalRecord>,
    /// Non-empty data rows seen below a header.
    pub total_rows: usize,
    pub rejections: Vec<RowRejection>,
}

pub trait SourceParser {
    fn kind(&self) -> SourceKind;

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile>;
}

pub fn parser_for(kind: SourceKind) -> Box<dyn SourceParser> {
    match kind {
        SourceKind::ImDeal => Box::new(ImDealParser),
        SourceKind::RepoDeal => Box::new(RepoDealParser),
        SourceKind::RepoDealOutstanding => Box::new(RepoDealOutstandingParser),
        SourceKind::MmDeal => Box::new(MmDealParser),
        SourceKind::MmDealOutstanding => Box::new(MmDealOutstandingParser),
        SourceKind::FimmdaVal => Box::new(FimmdaParser),
        SourceKind::SlrNds => Box::new(SlrNdsParser),
        SourceKind::GSec => Box::new(GSecParser),
        SourceKind::Sdl => Box::new(SdlParser),
    }
}

struct PendingRow<'w> {
    sheet: &'w str,
    index: usize,
    mapped: MappedRow,
}

/// Runs `layout` over `workbook` and builds records with `build`.
pub fn parse_with_layout(
    layout: &SourceLayout,
    workbook: &Workbook,
    ctx: &IngestContext<'_>,
    build: RecordBuilder,
) -> Result<ParsedFile> {
    let mut pending = Vec::new();
    for (sheet, required) in select_sheets(layout, workbook)? {
        let Some(header_idx) = find_header_row(&sheet.rows, &layout.header, ctx.config.header_scan_rows)
        else {
            if required {
                return Err(ReportError::HeaderNotFound {
                    source_kind: layout.kind,
                    sheet: sheet.name.clone(),
                });
            }
            debug!("{}: no header in sheet '{}', skipping", layout.kind, sheet.name);
            continue;
        };
        debug!(
            "{}: header found at row {} of sheet '{}'",
            layout.kind, header_idx, sheet.name
        );

        if layout
            .skip_sheet
            .is_some_and(|skip| skip(sheet, &sheet.rows[header_idx]))
        {
            debug!("{}: sheet '{}' belongs to another source, skipping", layout.kind, sheet.name);
            continue;
        }

        let columns = layout.columns.resolve(&sheet.rows[header_idx]);
        let marker = ctx.config.end_of_report_marker.to_lowercase();
        for (index, row) in sheet.rows.iter().enumerate().skip(header_idx + 1) {
            if layout.stops_at_end_marker && flatten_row(row).contains(&marker) {
                break;
            }
            if is_empty_row(row) {
                continue;
            }
            pending.push(PendingRow {
                sheet: &sheet.name,
                index,
                mapped: map_row(&columns, row),
            });
        }
    }

    let file_value_date = pending
        .iter()
        .find_map(|row| row.mapped.date(Field::ValueDate))
        .unwrap_or(ctx.as_of);

    let mut parsed = ParsedFile {
        total_rows: pending.len(),
        ..Default::default()
    };
    for row in pending {
        let file_ctx = FileContext {
            batch_id: ctx.batch_id,
            sheet: row.sheet,
            file_value_date,
        };
        match build(&row.mapped, &file_ctx) {
            Ok(record) => parsed.records.push(record),
            Err(reason) => {
                warn!(
                    "{}: skipping row {} of sheet '{}': {}",
                    layout.kind, row.index, row.sheet, reason
                );
                parsed.rejections.push(RowRejection {
                    sheet: row.sheet.to_string(),
                    row: row.index,
                    reason,
                });
            }
        }
    }
    Ok(parsed)
}

fn select_sheets<'w>(layout: &SourceLayout, workbook: &'w Workbook) -> Result<Vec<(&'w Sheet, bool)>> {
    if workbook.is_empty() {
        return Err(ReportError::EmptyWorkbook);
    }

    match layout.sheets {
        SheetSelection::Named {
            names,
            fallback_first,
        } => {
            let found = names.iter().find_map(|name| workbook.sheet(name));
            let sheet = match (found, fallback_first) {
                (Some(sheet), _) => Some(sheet),
                (None, true) => workbook.first_sheet(),
                (None, false) => None,
            };
            sheet
                .map(|s| vec![(s, true)])
                .ok_or_else(|| ReportError::SheetNotFound {
                    source_kind: layout.kind,
                    sheet: names.join("/"),
                })
        }
        SheetSelection::EachNamed(names) => Ok(names
            .iter()
            .filter_map(|name| workbook.sheet(name))
            .map(|s| (s, false))
            .collect()),
        SheetSelection::AllExcept(excluded) => Ok(workbook
            .sheets
            .iter()
            .filter(|s| {
                let name = s.name.to_lowercase();
                !excluded.iter().any(|word| name.contains(word))
            })
            .map(|s| (s, false))
            .collect()),
        SheetSelection::First => Ok(workbook.first_sheet().map(|s| vec![(s, true)]).unwrap_or_default()),
    }
}

pub(crate) fn finite(field: Field, value: f64) -> std::result::Result<f64, RowError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RowError::NonFinite(field))
    }
}

/// Parses uploaded files and persists their records for one batch.
pub struct Ingestor<'a> {
    store: &'a dyn RecordStore,
    config: &'a ReportConfig,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a dyn RecordStore, config: &'a ReportConfig) -> Self {
        Self { store, config }
    }

    pub fn ingest(
        &self,
        batch_id: &BatchId,
        kind: SourceKind,
        file: &SourceFile,
        as_of: NaiveDate,
    ) -> Result<ProcessingCounts> {
        let workbook = Workbook::from_bytes(&file.file_name, &file.bytes)?;
        debug!("{}: '{}' has sheets {:?}", kind, file.file_name, workbook.sheet_names());

        let ctx = IngestContext {
            batch_id,
            as_of,
            config: self.config,
        };
        let parsed = parser_for(kind).parse(&workbook, &ctx)?;
        let rejected = parsed.rejections.len();
        let total = parsed.total_rows;

        let processed = if kind.is_reference_data() {
            self.store_reference(batch_id, kind, parsed.records)?
        } else {
            self.store.replace_records(batch_id, kind, parsed.records)?
        };

        info!(
            "{}: {} rows read, {} stored, {} rejected",
            kind, total, processed, rejected
        );
        Ok(ProcessingCounts {
            total_records: total,
            processed_records: processed,
            error_records: rejected,
        })
    }

    fn store_reference(
        &self,
        batch_id: &BatchId,
        kind: SourceKind,
        records: Vec<CanonicalRecord>,
    ) -> Result<usize> {
        self.store.delete_records(batch_id, kind)?;
        let mut inserted = 0;
        for record in records {
            let isin = record.natural_key().unwrap_or_default().to_string();
            match self.store.insert_reference(batch_id, record) {
                Ok(true) => inserted += 1,
                Ok(false) | Err(ReportError::DuplicateKey { .. }) => {
                    warn!("{}: ISIN {} already recorded, keeping first", kind, isin);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(inserted)
    }
}
