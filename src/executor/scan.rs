use crate::{
    executor::predicate::{BoundPredicate, ComparisonOp},
    storage::{
        bplus_tree::{BPlusTree, Descent, KeyMode},
        table_file::TableFile,
    },
    types::{
        PageNumber, RowKey,
        error::Result,
        page::{Page, PageAddress},
        row::Row,
        value::{TypeCode, Value},
    },
};

/// A live row together with where it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub address: PageAddress,
    pub row_key: RowKey,
    pub type_codes: Vec<TypeCode>,
    pub values: Vec<Value>,
}

impl StoredRow {
    pub fn into_row(self) -> Row {
        Row::new(self.row_key, self.values)
    }
}

/// Leaf chain window: from `start` up to but excluding `end`. An `end` of 0
/// runs to the end of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub start: PageNumber,
    pub end: PageNumber,
}

impl ScanRange {
    pub fn full(tree: &mut BPlusTree) -> Result<Self> {
        let first = tree.first_leaf()?;
        Ok(Self {
            start: first.page_number,
            end: 0,
        })
    }

    /// Narrows the window when the predicate compares the integer primary
    /// key. Every other case is a full scan; the predicate is still applied to
    /// each row either way.
    pub fn plan(tree: &mut BPlusTree, key_mode: KeyMode, predicate: Option<&BoundPredicate>) -> Result<Self> {
        let (Some(predicate), KeyMode::PrimaryKey(key_column)) = (predicate, key_mode) else {
            return Self::full(tree);
        };
        if predicate.column_index != key_column {
            return Self::full(tree);
        }
        let Some(key) = predicate
            .value
            .as_integer()
            .and_then(|v| RowKey::try_from(v).ok())
        else {
            return Self::full(tree);
        };

        match predicate.op {
            ComparisonOp::Equal => {
                let leaf = tree.find_leaf(Descent::Keyed(key))?.leaf;
                Ok(Self {
                    start: leaf.page_number,
                    end: leaf.right_pointer,
                })
            }
            ComparisonOp::GreaterThan | ComparisonOp::GreaterThanOrEqual => {
                let leaf = tree.find_leaf(Descent::Keyed(key))?.leaf;
                Ok(Self {
                    start: leaf.page_number,
                    end: 0,
                })
            }
            ComparisonOp::LessThan | ComparisonOp::LessThanOrEqual => {
                let last = tree.find_leaf(Descent::Keyed(key))?.leaf;
                let first = tree.first_leaf()?;
                Ok(Self {
                    start: first.page_number,
                    end: last.right_pointer,
                })
            }
            ComparisonOp::NotEqual => Self::full(tree),
        }
    }
}

pub trait Scanner {
    fn scan(&mut self) -> Result<Option<StoredRow>>;
    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<StoredRow>>;
    fn reset(&mut self) -> Result<()>;
}

/// Walks leaves along their right pointers, yielding live cells in key order.
pub struct LeafScanner<'f> {
    file: &'f mut TableFile,
    range: ScanRange,
    current: Option<Page>,
    pointers: Vec<u16>,
    slot: usize,
    exhausted: bool,
}

impl<'f> LeafScanner<'f> {
    pub fn new(file: &'f mut TableFile, range: ScanRange) -> Self {
        Self {
            file,
            range,
            current: None,
            pointers: Vec::new(),
            slot: 0,
            exhausted: false,
        }
    }

    fn load(&mut self, page_number: PageNumber) -> Result<()> {
        let page = self.file.read_page(page_number)?;
        self.pointers = page.cell_pointers()?;
        self.slot = 0;
        self.current = Some(page);
        Ok(())
    }
}

impl Scanner for LeafScanner<'_> {
    fn scan(&mut self) -> Result<Option<StoredRow>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.current.is_none() {
            self.load(self.range.start)?;
        }
        loop {
            let Some(page) = self.current.as_ref() else {
                return Ok(None);
            };
            if self.slot < self.pointers.len() {
                let offset = self.pointers[self.slot] as usize;
                self.slot += 1;
                if page.is_tombstoned(offset)? {
                    continue;
                }
                let cell = Row::from_cell(page.cell(offset)?)?;
                return Ok(Some(StoredRow {
                    address: page.address(offset)?,
                    row_key: cell.row.row_key,
                    type_codes: cell.type_codes,
                    values: cell.row.values,
                }));
            }
            let next = page.right_pointer;
            if next == 0 || next == self.range.end {
                self.exhausted = true;
                return Ok(None);
            }
            self.load(next)?;
        }
    }

    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<StoredRow>> {
        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.scan()? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }

    fn reset(&mut self) -> Result<()> {
        self.current = None;
        self.pointers.clear();
        self.slot = 0;
        self.exhausted = false;
        Ok(())
    }
}

pub struct ScanIterator<S: Scanner> {
    scanner: S,
}

impl<S: Scanner> ScanIterator<S> {
    pub fn new(scanner: S) -> Self {
        Self { scanner }
    }
}

impl<S: Scanner> Iterator for ScanIterator<S> {
    type Item = Result<StoredRow>;
    fn next(&mut self) -> Option<Self::Item> {
        self.scanner.scan().transpose()
    }
}

/// Rows in `range` accepted by `filter`, in key order.
pub fn collect_rows<F>(file: &mut TableFile, range: ScanRange, mut filter: F) -> Result<Vec<StoredRow>>
where
    F: FnMut(&StoredRow) -> Result<bool>,
{
    let mut rows = Vec::new();
    for row in ScanIterator::new(LeafScanner::new(file, range)) {
        let row = row?;
        if filter(&row)? {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Plans the window for `predicate` and returns the matching rows.
pub fn scan_table(file: &mut TableFile, key_mode: KeyMode, predicate: Option<&BoundPredicate>) -> Result<Vec<StoredRow>> {
    let range = ScanRange::plan(&mut BPlusTree::new(file), key_mode, predicate)?;
    collect_rows(file, range, |row| match predicate {
        Some(predicate) => predicate.evaluate(row),
        None => Ok(true),
    })
}
