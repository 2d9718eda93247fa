use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::{
    executor::scan::{ScanRange, StoredRow, collect_rows},
    storage::{
        bplus_tree::{BPlusTree, KeyMode, row_key_from_value},
        free_space,
        table_file::TableFile,
    },
    types::{
        MAX_LEAF_CELL_SIZE, PageNumber,
        error::{DatabaseError, Result},
        row::{self, Row},
        value::{self, TypeCode, Value, pad_text},
    },
};

/// What happens to one matched row.
#[derive(Debug)]
enum RowChange {
    /// Same widths: overwrite type codes and value bytes in the existing cell.
    InPlace {
        offset: usize,
        writes: Vec<(usize, TypeCode, Value)>,
        type_codes: Vec<TypeCode>,
    },
    /// Tombstone the cell and insert `row` afresh.
    Reinsert { offset: usize, row: Row },
}

/// Applies in-place rewrites, tombstones and reinserts to the rows of one
/// table file.
pub struct RowUpdater<'f> {
    file: &'f mut TableFile,
    key_mode: KeyMode,
}

impl<'f> RowUpdater<'f> {
    pub fn new(file: &'f mut TableFile, key_mode: KeyMode) -> Self {
        Self { file, key_mode }
    }

    /// Sets `assignments` (column index, value) on every row in `range`
    /// accepted by `filter`. Returns the number of rows changed.
    ///
    /// Matches are collected before anything is written, so tombstones and
    /// reinserts cannot disturb the walk. Reinserts run last.
    pub fn update<F>(&mut self, range: ScanRange, filter: F, assignments: &[(usize, Value)]) -> Result<usize>
    where
        F: FnMut(&StoredRow) -> Result<bool>,
    {
        let matches = collect_rows(self.file, range, filter)?;
        if matches.is_empty() {
            return Ok(0);
        }

        let mut changes: BTreeMap<PageNumber, Vec<RowChange>> = BTreeMap::new();
        let mut new_keys = HashSet::new();
        for stored in &matches {
            let change = self.plan_change(stored, assignments)?;
            if let RowChange::Reinsert { row, .. } = &change {
                if row.row_key != stored.row_key {
                    let taken = BPlusTree::new(self.file).contains_key(row.row_key)?;
                    if taken || !new_keys.insert(row.row_key) {
                        return Err(DatabaseError::DuplicateKey { key: row.row_key });
                    }
                }
                let size = row.cell_size()?;
                if size > MAX_LEAF_CELL_SIZE {
                    return Err(DatabaseError::RecordTooLarge {
                        size,
                        max: MAX_LEAF_CELL_SIZE,
                    });
                }
            }
            changes
                .entry(stored.address.page_number())
                .or_default()
                .push(change);
        }

        let mut reinserts = Vec::new();
        for (page_number, page_changes) in changes {
            let mut page = self.file.read_page(page_number)?;
            for change in page_changes {
                match change {
                    RowChange::InPlace {
                        offset,
                        writes,
                        type_codes,
                    } => {
                        for (column, code, value) in writes {
                            page.write_u8(offset + row::type_code_offset(column), code.as_u8())?;
                            let bytes = value::encode(code, &value)?;
                            page.write_bytes(offset + row::value_offset(&type_codes, column), &bytes)?;
                        }
                    }
                    RowChange::Reinsert { offset, row } => {
                        page.tombstone(offset as u16)?;
                        reinserts.push(row);
                    }
                }
            }
            free_space::refresh_free_space(&mut page)?;
            self.file.write_page(&page)?;
        }

        if !reinserts.is_empty() {
            debug!(table = %self.file.name(), rows = reinserts.len(), "reinserting resized rows");
        }
        let mut tree = BPlusTree::new(self.file);
        for mut row in reinserts {
            // a surrogate row goes to the rightmost leaf, so it needs the next id
            if self.key_mode == KeyMode::Surrogate {
                row.row_key = tree.next_row_key()?;
            }
            tree.insert(&row, self.key_mode.descent(row.row_key))?;
        }
        self.file.commit()?;
        Ok(matches.len())
    }

    fn plan_change(&self, stored: &StoredRow, assignments: &[(usize, Value)]) -> Result<RowChange> {
        let mut values = stored.values.clone();
        let mut writes = Vec::with_capacity(assignments.len());
        let mut fits = true;

        for (column, value) in assignments {
            let old_code = *stored
                .type_codes
                .get(*column)
                .ok_or(DatabaseError::ColumnIndexOutOfBounds { index: *column })?;
            let fitted = fit_to_slot(old_code, value)?;
            match fitted {
                Some((code, value)) => {
                    values[*column] = value.clone();
                    writes.push((*column, code, value));
                }
                None => {
                    values[*column] = value.clone();
                    fits = false;
                }
            }
        }

        let row_key = match self.key_mode {
            KeyMode::PrimaryKey(index) if assignments.iter().any(|(c, _)| *c == index) => {
                row_key_from_value(&values[index])?
            }
            _ => stored.row_key,
        };

        let offset = stored.address.offset();
        if fits && row_key == stored.row_key {
            Ok(RowChange::InPlace {
                offset,
                writes,
                type_codes: stored.type_codes.clone(),
            })
        } else {
            Ok(RowChange::Reinsert {
                offset,
                row: Row::new(row_key, values),
            })
        }
    }

    /// Tombstones every row in `range` accepted by `filter`. Returns the
    /// number of rows removed.
    pub fn delete<F>(&mut self, range: ScanRange, filter: F) -> Result<usize>
    where
        F: FnMut(&StoredRow) -> Result<bool>,
    {
        let matches = collect_rows(self.file, range, filter)?;
        if matches.is_empty() {
            return Ok(0);
        }

        let mut by_page: BTreeMap<PageNumber, Vec<usize>> = BTreeMap::new();
        for stored in &matches {
            by_page
                .entry(stored.address.page_number())
                .or_default()
                .push(stored.address.offset());
        }
        for (page_number, offsets) in by_page {
            let mut page = self.file.read_page(page_number)?;
            for offset in offsets {
                page.tombstone(offset as u16)?;
            }
            free_space::refresh_free_space(&mut page)?;
            self.file.write_page(&page)?;
        }
        self.file.commit()?;
        Ok(matches.len())
    }
}

/// The code and value to write if `value` fits the existing slot. Shorter
/// text is padded to the slot; anything else must match its width exactly.
fn fit_to_slot(old_code: TypeCode, value: &Value) -> Result<Option<(TypeCode, Value)>> {
    if let (true, Value::Text(text)) = (old_code.is_text(), value) {
        if text.len() <= old_code.width() {
            return Ok(Some((old_code, Value::Text(pad_text(text, old_code.width())))));
        }
        return Ok(None);
    }
    let code = value.type_code()?;
    if code.width() == old_code.width() {
        Ok(Some((code, value.clone())))
    } else {
        Ok(None)
    }
}
