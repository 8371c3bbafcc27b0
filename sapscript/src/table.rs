use crate::errors::ScriptingError;
use crate::ids::MAIN_WINDOW;
use crate::session::ElementSource;
use tracing::{debug, info, instrument};

/// Placeholder for the row index inside a column template.
pub const ROW_PLACEHOLDER: &str = "{}";

/// Caret offset applied after writing, before the row is committed.
pub const CARET_OFFSET: usize = 4;

pub const DEFAULT_SCAN_LIMIT: usize = 1000;

/// Fills the first empty cell of a table column.
///
/// The column is given as an element id template such as
/// `wnd[0]/usr/tblSAPMV45ATCTRL_U_ERF_AUFTRAG/ctxtRV45A-MABNR[1,{}]`.
/// Rows are scanned from 0; the cursor only moves forward and never writes
/// into a cell that already holds text.
pub struct TableWriter<'a> {
    source: &'a dyn ElementSource,
    scan_limit: usize,
}

impl<'a> TableWriter<'a> {
    pub fn new(source: &'a dyn ElementSource) -> Self {
        Self {
            source,
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }

    pub fn with_scan_limit(mut self, scan_limit: usize) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    /// Write `value` into the first empty row and commit it with Enter.
    ///
    /// A row that does not resolve marks the end of the table and is resolved
    /// once more, which succeeds once the control has appended it. A row that
    /// turns up holding text is skipped like any other filled row. Returns the
    /// row index written.
    #[instrument(level = "debug", skip(self, value))]
    pub fn write_first_empty(&self, column_template: &str, value: &str) -> Result<usize, ScriptingError> {
        if !column_template.contains(ROW_PLACEHOLDER) {
            return Err(ScriptingError::InvalidArgument(format!(
                "Column template '{column_template}' has no {ROW_PLACEHOLDER} row placeholder"
            )));
        }

        let mut row = 0;
        let cell = loop {
            if row >= self.scan_limit {
                return Err(ScriptingError::TableFull {
                    template: column_template.to_string(),
                    limit: self.scan_limit,
                });
            }
            let path = cell_path(column_template, row);
            let cell = match self.source.resolve(&path) {
                Ok(cell) => cell,
                Err(e) if e.is_not_found() => {
                    debug!(row, "end of table");
                    // The control appends rows on demand; a late row may already hold data.
                    self.source.resolve(&path)?
                }
                Err(e) => return Err(e),
            };
            if cell.text()?.is_empty() {
                break cell;
            }
            row += 1;
        };

        cell.set_text(value)?;
        cell.set_focus()?;
        cell.set_caret_position(CARET_OFFSET)?;
        self.source.resolve(MAIN_WINDOW)?.confirm()?;

        info!(row, "Wrote value into first empty row");
        Ok(row)
    }
}

/// Element id of `row` within `column_template`.
pub fn cell_path(column_template: &str, row: usize) -> String {
    column_template.replace(ROW_PLACEHOLDER, &row.to_string())
}
