use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    storage::{free_space, table_file::TableFile},
    types::{
        CELL_POINTER_SIZE, DEGREE, MAX_LEAF_CELL_SIZE, PageNumber, ROOT_PAGE, RowKey,
        entry::InteriorCell,
        error::{DatabaseError, Result},
        page::{Page, PageType},
        row::Row,
        value::Value,
    },
};

/// How the navigator picks a child at each interior page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descent {
    /// Binary search of the separators for this key.
    Keyed(RowKey),
    /// First child, reaching the head of the leaf chain.
    Leftmost,
    /// Right pointer, reaching the tail of the leaf chain.
    Rightmost,
}

/// Where row keys come from for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Engine-assigned, increasing row ids.
    Surrogate,
    /// The integer primary key at this column index.
    PrimaryKey(usize),
}

impl KeyMode {
    pub fn descent(&self, key: RowKey) -> Descent {
        match self {
            KeyMode::Surrogate => Descent::Rightmost,
            KeyMode::PrimaryKey(_) => Descent::Keyed(key),
        }
    }
}

/// A leaf and the interior pages above it, root first.
#[derive(Debug, Clone)]
pub struct LeafPath {
    pub leaf: Page,
    pub ancestors: Vec<PageNumber>,
}

pub fn row_key_from_value(value: &Value) -> Result<RowKey> {
    match value {
        Value::TinyInt(v) => Ok(*v as RowKey),
        Value::SmallInt(v) => Ok(*v as RowKey),
        Value::Int(v) => Ok(*v),
        other => Err(DatabaseError::TypeMismatch {
            expected: "integer primary key".to_string(),
            actual: other.kind_name().to_string(),
        }),
    }
}

pub struct BPlusTree<'f> {
    file: &'f mut TableFile,
}

impl<'f> BPlusTree<'f> {
    pub fn new(file: &'f mut TableFile) -> Self {
        Self { file }
    }

    pub fn file(&mut self) -> &mut TableFile {
        &mut *self.file
    }

    /// Creates an empty leaf root on page 1 if the file has none yet.
    pub fn ensure_root(&mut self) -> Result<bool> {
        if self.file.has_root() {
            return Ok(false);
        }
        self.file.initialize_page(ROOT_PAGE, PageType::LeafTable)?;
        Ok(true)
    }

    pub fn find_leaf(&mut self, descent: Descent) -> Result<LeafPath> {
        if !self.file.has_root() {
            return Err(DatabaseError::EmptyTable {
                name: self.file.name(),
            });
        }
        let mut ancestors = Vec::new();
        let mut page = self.file.read_page(ROOT_PAGE)?;
        while !page.is_leaf() {
            if ancestors.len() as u32 >= self.file.page_count() {
                return Err(DatabaseError::corrupted(page.page_number, "cycle in tree"));
            }
            let child = choose_child(&page, descent)?;
            ancestors.push(page.page_number);
            page = self.file.read_page(child)?;
        }
        Ok(LeafPath {
            leaf: page,
            ancestors,
        })
    }

    pub fn first_leaf(&mut self) -> Result<Page> {
        Ok(self.find_leaf(Descent::Leftmost)?.leaf)
    }

    pub fn contains_key(&mut self, key: RowKey) -> Result<bool> {
        if !self.file.has_root() {
            return Ok(false);
        }
        Ok(self.find_leaf(Descent::Keyed(key))?.leaf.keys()?.contains(&key))
    }

    /// Next surrogate row id: one past the last key of the rightmost leaf. An
    /// emptied rightmost leaf falls back to its parent's separators.
    pub fn next_row_key(&mut self) -> Result<RowKey> {
        if !self.file.has_root() {
            return Ok(1);
        }
        let LeafPath { leaf, ancestors } = self.find_leaf(Descent::Rightmost)?;
        let last = match leaf.keys()?.last() {
            Some(key) => *key,
            None => match ancestors.last() {
                Some(parent_number) => {
                    let parent = self.file.read_page(*parent_number)?;
                    separator_before(&parent, leaf.page_number)?.unwrap_or(0)
                }
                None => leaf.cell_count as RowKey,
            },
        };
        last.checked_add(1).ok_or_else(|| {
            DatabaseError::corrupted(leaf.page_number, "row key space exhausted")
        })
    }

    /// Inserts a row. A key that already exists is rejected before any page
    /// is written.
    pub fn insert(&mut self, row: &Row, descent: Descent) -> Result<()> {
        let cell = row.to_cell()?;
        if cell.len() > MAX_LEAF_CELL_SIZE {
            return Err(DatabaseError::RecordTooLarge {
                size: cell.len(),
                max: MAX_LEAF_CELL_SIZE,
            });
        }
        self.ensure_root()?;
        let LeafPath { leaf, ancestors } = self.find_leaf(descent)?;
        if leaf.keys()?.contains(&row.row_key) {
            return Err(DatabaseError::DuplicateKey { key: row.row_key });
        }
        self.insert_cell(leaf, ancestors, row.row_key, cell)
    }

    fn insert_cell(
        &mut self,
        mut page: Page,
        ancestors: Vec<PageNumber>,
        key: RowKey,
        cell: Vec<u8>,
    ) -> Result<()> {
        if page.cell_count as usize + 1 >= DEGREE {
            return self.split(page, ancestors, key, cell);
        }

        let needed = cell.len() + CELL_POINTER_SIZE;
        if page.unallocated_space() < needed {
            let free = free_space::scan_free_space(&page)?;
            if page.unallocated_space() + free.reclaimable() < needed {
                return Err(DatabaseError::PageFull {
                    page_number: page.page_number,
                });
            }
            free_space::compact(&mut page)?;
        }

        let offset = page.append_cell(&cell)?;
        page.insert_cell_pointer(offset)?;
        free_space::refresh_free_space(&mut page)?;
        self.file.write_page(&page)
    }

    /// Splits a full page around the lower median of its keys plus `key`.
    /// Keys up to the pivot stay in `page`; the rest go to a new sibling.
    fn split(
        &mut self,
        mut page: Page,
        mut ancestors: Vec<PageNumber>,
        key: RowKey,
        cell: Vec<u8>,
    ) -> Result<()> {
        let mut records = BTreeMap::new();
        for pointer in page.cell_pointers()? {
            let offset = pointer as usize;
            if page.is_tombstoned(offset)? {
                continue;
            }
            let existing = page.cell_key(offset)?;
            if records.insert(existing, page.cell(offset)?.to_vec()).is_some() {
                return Err(DatabaseError::DuplicateKey { key: existing });
            }
        }
        if records.insert(key, cell).is_some() {
            return Err(DatabaseError::DuplicateKey { key });
        }

        let keys: Vec<RowKey> = records.keys().copied().collect();
        let pivot = keys[(keys.len() - 1) / 2];
        let leaf = page.is_leaf();

        // An interior pivot moves up; its left child becomes the lower
        // half's right pointer.
        let pivot_child = if leaf {
            0
        } else {
            match records.remove(&pivot) {
                Some(bytes) => InteriorCell::from_bytes(&bytes)?.left_child,
                None => return Err(DatabaseError::corrupted(page.page_number, "pivot vanished")),
            }
        };
        let (lower, upper): (Vec<_>, Vec<_>) = records.into_iter().partition(|(k, _)| *k <= pivot);

        debug!(
            page = page.page_number,
            pivot,
            leaf,
            lower = lower.len(),
            upper = upper.len(),
            "splitting page"
        );

        match ancestors.pop() {
            Some(parent_number) => {
                let mut sibling = self.file.allocate_page(page.page_type)?;
                let sibling_right = page.right_pointer;
                let page_right = if leaf { sibling.page_number } else { pivot_child };

                rewrite(&mut page, lower, page_right)?;
                rewrite(&mut sibling, upper, sibling_right)?;
                self.file.write_page(&page)?;
                self.file.write_page(&sibling)?;

                let mut parent = self.file.read_page(parent_number)?;
                relink_child(&mut parent, page.page_number, sibling.page_number)?;
                let separator = InteriorCell::new(page.page_number, pivot).to_bytes().to_vec();
                self.insert_cell(parent, ancestors, pivot, separator)
            }
            None => {
                if page.page_number != ROOT_PAGE {
                    return Err(DatabaseError::corrupted(
                        page.page_number,
                        "page without ancestors is not the root",
                    ));
                }
                let mut left = self.file.allocate_page(page.page_type)?;
                let mut right = self.file.allocate_page(page.page_type)?;
                let left_right = if leaf { right.page_number } else { pivot_child };

                rewrite(&mut left, lower, left_right)?;
                rewrite(&mut right, upper, page.right_pointer)?;
                self.file.write_page(&left)?;
                self.file.write_page(&right)?;

                page.reset(PageType::InteriorTable);
                let offset = page.append_cell(&InteriorCell::new(left.page_number, pivot).to_bytes())?;
                page.set_cell_pointers(&[offset])?;
                page.right_pointer = right.page_number;
                free_space::refresh_free_space(&mut page)?;
                self.file.write_page(&page)
            }
        }
    }
}

fn choose_child(page: &Page, descent: Descent) -> Result<PageNumber> {
    let pointers = page.cell_pointers()?;
    let right = || {
        if page.right_pointer == 0 {
            Err(DatabaseError::corrupted(page.page_number, "interior page has no right pointer"))
        } else {
            Ok(page.right_pointer)
        }
    };
    if pointers.is_empty() {
        return right();
    }
    match descent {
        Descent::Leftmost => page.left_child(pointers[0] as usize),
        Descent::Rightmost => right(),
        Descent::Keyed(key) => {
            let separators = pointers
                .iter()
                .map(|p| page.cell_key(*p as usize))
                .collect::<Result<Vec<_>>>()?;
            let index = match separators.binary_search(&key) {
                Ok(i) | Err(i) => i,
            };
            if index == separators.len() {
                right()
            } else {
                page.left_child(pointers[index] as usize)
            }
        }
    }
}

/// Separator bounding `child` from below: the one preceding the cell that
/// points at it, or the last one when `child` is the right pointer.
fn separator_before(parent: &Page, child: PageNumber) -> Result<Option<RowKey>> {
    let mut previous = None;
    for pointer in parent.cell_pointers()? {
        if parent.left_child(pointer as usize)? == child {
            return Ok(previous);
        }
        previous = Some(parent.cell_key(pointer as usize)?);
    }
    Ok(previous)
}

/// Points whichever reference `parent` holds to `old_child` at `new_child`.
fn relink_child(parent: &mut Page, old_child: PageNumber, new_child: PageNumber) -> Result<()> {
    for pointer in parent.cell_pointers()? {
        if parent.left_child(pointer as usize)? == old_child {
            return parent.set_left_child(pointer as usize, new_child);
        }
    }
    if parent.right_pointer == old_child {
        parent.right_pointer = new_child;
        return Ok(());
    }
    Err(DatabaseError::PointerNotFound {
        parent: parent.page_number,
        child: old_child,
    })
}

/// Replaces the page's contents with `records`, already in key order.
fn rewrite(page: &mut Page, records: Vec<(RowKey, Vec<u8>)>, right_pointer: PageNumber) -> Result<()> {
    page.reset(page.page_type);
    page.right_pointer = right_pointer;
    let mut pointers = Vec::with_capacity(records.len());
    for (_, cell) in records {
        pointers.push(page.append_cell(&cell)?);
    }
    page.set_cell_pointers(&pointers)?;
    free_space::refresh_free_space(page)?;
    Ok(())
}
