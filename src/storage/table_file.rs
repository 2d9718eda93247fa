use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, trace, warn};

use crate::{
    storage::header::DatabaseHeader,
    types::{
        DATABASE_HEADER_SIZE, PAGE_SIZE, PageNumber, ROOT_PAGE, SCHEMA_PAGE,
        error::{DatabaseError, Result},
        page::{Page, PageAddress, PageType},
    },
};

/// Open handle on one table file. The underlying descriptor is closed when the
/// value is dropped, on every exit path.
#[derive(Debug)]
pub struct TableFile {
    path: PathBuf,
    file: File,
    header: DatabaseHeader,
    read_only: bool,
}

impl TableFile {
    /// Creates (or truncates) a table file holding only the schema page, with
    /// one name cell per column.
    pub fn create<P: AsRef<Path>>(path: P, column_names: &[String]) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut table_file = Self {
            path: path.to_path_buf(),
            file,
            header: DatabaseHeader::default(),
            read_only: false,
        };

        let mut schema_page = table_file.initialize_page(SCHEMA_PAGE, PageType::LeafTable)?;
        write_column_names(&mut schema_page, column_names)?;
        table_file.write_page(&schema_page)?;
        table_file.commit()?;
        debug!(path = %path.display(), columns = column_names.len(), "created table file");
        Ok(table_file)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut buffer = vec![0u8; DATABASE_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buffer)?;
        let mut header = DatabaseHeader::from_bytes(&buffer)?;

        if header.file_format_read_version > 1 {
            return Err(DatabaseError::UnsupportedFileFormat {
                read: header.file_format_read_version,
                write: header.file_format_write_version,
            });
        }
        let read_only = header.file_format_write_version > 1;

        if !header.is_consistent() {
            let pages = pages_for_len(file.metadata()?.len());
            warn!(
                path = %path.display(),
                counter = header.file_change_counter,
                valid_for = header.version_valid_for,
                pages,
                "change counters disagree, recomputing page count from file length"
            );
            header.database_size_pages = pages;
        }

        debug!(path = %path.display(), pages = header.database_size_pages, read_only, "opened table file");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            read_only,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem, used in error messages.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn header(&self) -> &DatabaseHeader {
        &self.header
    }

    pub fn page_count(&self) -> u32 {
        self.header.database_size_pages
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Page 1 exists.
    pub fn has_root(&self) -> bool {
        self.page_count() > ROOT_PAGE
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(DatabaseError::ReadOnly {
                path: self.path.display().to_string(),
                version: self.header.file_format_write_version,
            });
        }
        Ok(())
    }

    pub fn read_page(&mut self, page_number: PageNumber) -> Result<Page> {
        if page_number >= self.page_count() {
            return Err(DatabaseError::corrupted(
                page_number,
                format!("page is beyond the end of the file ({} pages)", self.page_count()),
            ));
        }
        let address = PageAddress::new(page_number, 0)?;
        let mut buffer = vec![0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(address.file_offset()))?;
        self.file.read_exact(&mut buffer)?;
        Page::from_bytes(page_number, &buffer)
    }

    /// Writes the whole page. On page 0 the database header is left alone.
    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        self.ensure_writable()?;
        let bytes = page.to_bytes();
        let start = page.header_offset();
        let address = PageAddress::new(page.page_number, start)?;
        self.file.seek(SeekFrom::Start(address.file_offset()))?;
        self.file.write_all(&bytes[start..])?;
        Ok(())
    }

    pub fn write_page_header(&mut self, page: &Page) -> Result<()> {
        self.ensure_writable()?;
        let address = PageAddress::new(page.page_number, page.header_offset())?;
        self.file.seek(SeekFrom::Start(address.file_offset()))?;
        self.file.write_all(&page.header_bytes())?;
        Ok(())
    }

    /// Zero-fills page `page_number` on disk and writes an empty header of
    /// the given type. Extends the tracked page count past the high-water
    /// mark when needed.
    pub fn initialize_page(&mut self, page_number: PageNumber, page_type: PageType) -> Result<Page> {
        self.ensure_writable()?;
        let address = PageAddress::new(page_number, 0)?;
        self.file.seek(SeekFrom::Start(address.file_offset()))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;
        if page_number >= self.header.database_size_pages {
            self.header.database_size_pages = page_number + 1;
        }
        let page = Page::new(page_number, page_type);
        self.write_page_header(&page)?;
        trace!(page = page_number, ?page_type, "initialized page");
        Ok(page)
    }

    /// Initializes the next page past the end of the file.
    pub fn allocate_page(&mut self, page_type: PageType) -> Result<Page> {
        let page_number = self.header.database_size_pages;
        debug!(table = %self.name(), page = page_number, ?page_type, "allocating page");
        self.initialize_page(page_number, page_type)
    }

    /// Bumps the change counter, refreshes the page count and persists the
    /// database header.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_writable()?;
        let pages = pages_for_len(self.file.metadata()?.len());
        self.header.database_size_pages = self.header.database_size_pages.max(pages);
        self.header.file_change_counter = self.header.file_change_counter.wrapping_add(1);
        self.header.version_valid_for = self.header.file_change_counter;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Column names stored on the schema page, in column order.
    pub fn column_names(&mut self) -> Result<Vec<String>> {
        let page = self.read_page(SCHEMA_PAGE)?;
        let mut columns = Vec::with_capacity(page.cell_count as usize);
        for pointer in page.cell_pointers()? {
            let offset = pointer as usize;
            let len = page.read_u16(offset)? as usize;
            let column_id = page.read_u32(offset + 2)?;
            let name = String::from_utf8(page.slice(offset + 6, len)?.to_vec()).map_err(|e| {
                DatabaseError::SerializationError {
                    details: format!("invalid column name: {}", e),
                }
            })?;
            columns.push((column_id, name));
        }
        columns.sort_by_key(|(id, _)| *id);
        Ok(columns.into_iter().map(|(_, name)| name).collect())
    }
}

fn write_column_names(page: &mut Page, column_names: &[String]) -> Result<()> {
    let mut pointers = Vec::with_capacity(column_names.len());
    for (column_id, name) in column_names.iter().enumerate() {
        let mut cell = Vec::with_capacity(6 + name.len());
        cell.extend_from_slice(&(name.len() as u16).to_be_bytes());
        cell.extend_from_slice(&(column_id as u32).to_be_bytes());
        cell.extend_from_slice(name.as_bytes());
        pointers.push(page.append_cell(&cell)?);
        page.set_cell_pointers(&pointers)?;
    }
    Ok(())
}

fn pages_for_len(len: u64) -> u32 {
    len.div_ceil(PAGE_SIZE as u64) as u32
}
