//! Free-block and fragmentation bookkeeping for a single page.
//!
//! Dead space in the cell content area is every byte that no live cell covers:
//! tombstoned cells, whether or not they still have a pointer, and the holes
//! left behind once their pointers are dropped. Adjacent dead regions merge
//! into one run. Runs longer than [`MIN_FREE_BLOCK_SIZE`] become free blocks,
//! each starting with `[next:2][length:2]` and chained from the lowest address
//! upward. Shorter runs only count as fragmented bytes.

use tracing::debug;

use crate::types::{
    CELL_CONTENT_END,
    error::{DatabaseError, Result},
    page::Page,
};

/// A free block needs room for its own `[next][length]` record.
pub const MIN_FREE_BLOCK_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    pub offset: u16,
    pub length: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeSpace {
    /// Offset of the lowest free block, 0 when there is none.
    pub first_free_block: u16,
    pub fragmented_bytes: usize,
    /// Blocks in ascending address order.
    pub blocks: Vec<FreeBlock>,
}

impl FreeSpace {
    /// Dead bytes that compaction would hand back to the unallocated region.
    pub fn reclaimable(&self) -> usize {
        self.blocks.iter().map(|b| b.length as usize).sum::<usize>() + self.fragmented_bytes
    }
}

/// Computes the free-space summary of `page` without modifying it.
pub fn scan_free_space(page: &Page) -> Result<FreeSpace> {
    let mut cells = Vec::with_capacity(page.cell_count as usize);
    for pointer in page.cell_pointers()? {
        let offset = pointer as usize;
        cells.push((offset, page.cell_size(offset)?, page.is_tombstoned(offset)?));
    }
    cells.sort_by_key(|(offset, _, _)| *offset);

    let mut summary = FreeSpace::default();
    let mut run: Option<(usize, usize)> = None;
    let mut cursor = page.cell_content_start as usize;

    for (offset, size, dead) in cells {
        if offset < cursor {
            return Err(DatabaseError::corrupted(
                page.page_number,
                format!("cell at {} overlaps the previous cell or the pointer array", offset),
            ));
        }
        if offset > cursor {
            extend_run(&mut run, cursor, offset - cursor);
        }
        if dead {
            extend_run(&mut run, offset, size);
        } else {
            close_run(&mut run, &mut summary);
        }
        cursor = offset + size;
    }
    if cursor > CELL_CONTENT_END {
        return Err(DatabaseError::corrupted(
            page.page_number,
            "cell extends into the reserved area",
        ));
    }
    if cursor < CELL_CONTENT_END {
        extend_run(&mut run, cursor, CELL_CONTENT_END - cursor);
    }
    close_run(&mut run, &mut summary);

    summary.first_free_block = summary.blocks.first().map_or(0, |b| b.offset);
    Ok(summary)
}

fn extend_run(run: &mut Option<(usize, usize)>, start: usize, len: usize) {
    match run {
        Some((_, run_len)) => *run_len += len,
        None => *run = Some((start, len)),
    }
}

fn close_run(run: &mut Option<(usize, usize)>, summary: &mut FreeSpace) {
    if let Some((start, len)) = run.take() {
        if len > MIN_FREE_BLOCK_SIZE {
            summary.blocks.push(FreeBlock {
                offset: start as u16,
                length: len as u16,
            });
        } else {
            summary.fragmented_bytes += len;
        }
    }
}

/// Threads the chain through the page and copies the summary into the
/// header fields.
pub fn link_free_blocks(page: &mut Page, summary: &FreeSpace) -> Result<()> {
    for (i, block) in summary.blocks.iter().enumerate() {
        let next = summary.blocks.get(i + 1).map_or(0, |b| b.offset);
        page.write_u16(block.offset as usize, next)?;
        page.write_u16(block.offset as usize + 2, block.length)?;
    }
    page.first_free_block = summary.first_free_block;
    page.fragmented_bytes = summary.fragmented_bytes.min(u8::MAX as usize) as u8;
    Ok(())
}

/// Pointers to tombstoned cells are dropped first: the chain records overwrite
/// the delete marker.
pub fn refresh_free_space(page: &mut Page) -> Result<FreeSpace> {
    prune_tombstoned(page)?;
    let summary = scan_free_space(page)?;
    link_free_blocks(page, &summary)?;
    Ok(summary)
}

fn prune_tombstoned(page: &mut Page) -> Result<()> {
    let pointers = page.cell_pointers()?;
    let mut live = Vec::with_capacity(pointers.len());
    for pointer in &pointers {
        if !page.is_tombstoned(*pointer as usize)? {
            live.push(*pointer);
        }
    }
    if live.len() != pointers.len() {
        page.set_cell_pointers(&live)?;
    }
    Ok(())
}

/// Rewrites the live cells packed against the end of the content area,
/// keeping their relative address order. Pointer order is unchanged.
pub fn compact(page: &mut Page) -> Result<()> {
    prune_tombstoned(page)?;
    let pointers = page.cell_pointers()?;

    let mut cells = Vec::with_capacity(pointers.len());
    for (index, pointer) in pointers.iter().enumerate() {
        cells.push((index, *pointer, page.cell(*pointer as usize)?.to_vec()));
    }
    cells.sort_by(|a, b| b.1.cmp(&a.1));

    let area_start = page.cell_pointer_offset() + pointers.len() * 2;
    page.fill(area_start, CELL_CONTENT_END - area_start, 0)?;

    let mut relocated = pointers.clone();
    let mut cursor = CELL_CONTENT_END;
    for (index, _, bytes) in cells {
        cursor -= bytes.len();
        page.write_bytes(cursor, &bytes)?;
        relocated[index] = cursor as u16;
    }
    page.cell_content_start = cursor as u16;
    page.set_cell_pointers(&relocated)?;
    page.first_free_block = 0;
    page.fragmented_bytes = 0;

    debug!(page = page.page_number, cells = relocated.len(), "compacted page");
    Ok(())
}
