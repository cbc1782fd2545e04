//! Matrix reader with an explicit paged cache over a memory-mapped file.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use memmap2::Mmap;
use parking_lot::Mutex;

use crate::format::{MatrixHeader, PageSpan, RowLocation};
use crate::{MatrixError, SparseRow};

/// How much of the file to materialize at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Materialize every page up front.
    Eager,
    /// Materialize pages on first access; keep at most the configured budget
    /// resident, evicting least-recently-used pages. A re-access after
    /// eviction re-faults the page from the mapping transparently.
    Lazy,
}

/// Counters for the lazy page cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU page cache. Readers hold `Arc` clones of resident pages, so eviction
/// never invalidates data another thread is still looking at.
struct PageCache {
    resident: AHashMap<u32, (Arc<Vec<u8>>, u64)>,
    tick: u64,
    budget: usize,
    stats: PageCacheStats,
}

impl PageCache {
    fn new(budget: usize) -> Self {
        Self {
            resident: AHashMap::new(),
            tick: 0,
            budget: budget.max(1),
            stats: PageCacheStats::default(),
        }
    }

    fn get(&mut self, page: u32) -> Option<Arc<Vec<u8>>> {
        self.tick += 1;
        let tick = self.tick;
        match self.resident.get_mut(&page) {
            Some((bytes, used)) => {
                *used = tick;
                self.stats.hits += 1;
                Some(Arc::clone(bytes))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    fn insert(&mut self, page: u32, bytes: Arc<Vec<u8>>) {
        self.resident.insert(page, (bytes, self.tick));
        while self.resident.len() > self.budget {
            let Some(victim) = self
                .resident
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(&p, _)| p)
            else {
                break;
            };
            self.resident.remove(&victim);
            self.stats.evictions += 1;
            tracing::debug!(page = victim, "evicted matrix page");
        }
    }
}

enum Residency {
    Eager(Vec<Arc<Vec<u8>>>),
    Lazy(Mutex<PageCache>),
}

/// Read-only view of a finished `.smx` file.
///
/// The row index is always loaded eagerly; only the body pages are subject to
/// the eager/lazy distinction. Safe for concurrent readers in either mode.
pub struct MatrixReader {
    mmap: Mmap,
    header: MatrixHeader,
    pages: Vec<PageSpan>,
    /// Ascending by row id, mirrors the on-disk index exactly.
    index: Vec<RowLocation>,
    by_id: AHashMap<u32, usize>,
    residency: Residency,
}

impl MatrixReader {
    /// Open a matrix file. `cache_pages` bounds residency in lazy mode and is
    /// ignored in eager mode.
    pub fn open(path: &Path, mode: OpenMode, cache_pages: usize) -> Result<Self, MatrixError> {
        let file = File::open(path)?;
        // Safety: the file is immutable once finished; writers only ever
        // rename a complete file into place.
        let mmap = unsafe { Mmap::map(&file)? };

        let header = MatrixHeader::from_bytes(&mmap)?;
        if (mmap.len() as u64) < header.total_size {
            return Err(MatrixError::Malformed(
                "file shorter than header total size".to_string(),
            ));
        }

        let pages: Vec<PageSpan> = bincode::deserialize(
            &mmap[header.page_table_offset as usize..header.row_index_offset as usize],
        )?;
        let index: Vec<RowLocation> =
            bincode::deserialize(&mmap[header.row_index_offset as usize..header.total_size as usize])?;

        if pages.len() != header.page_count as usize || index.len() != header.row_count as usize {
            return Err(MatrixError::Malformed(
                "section lengths disagree with header counts".to_string(),
            ));
        }
        for pair in index.windows(2) {
            if pair[1].row_id <= pair[0].row_id {
                return Err(MatrixError::Malformed(
                    "row index is not strictly ascending".to_string(),
                ));
            }
        }

        let by_id = index
            .iter()
            .enumerate()
            .map(|(pos, loc)| (loc.row_id, pos))
            .collect();

        let residency = match mode {
            OpenMode::Eager => {
                let mut resident = Vec::with_capacity(pages.len());
                for (page_no, span) in pages.iter().enumerate() {
                    resident.push(Arc::new(page_bytes(&mmap, span, page_no as u32)?.to_vec()));
                }
                Residency::Eager(resident)
            }
            OpenMode::Lazy => Residency::Lazy(Mutex::new(PageCache::new(cache_pages))),
        };

        Ok(Self {
            mmap,
            header,
            pages,
            index,
            by_id,
            residency,
        })
    }

    pub fn header(&self) -> &MatrixHeader {
        &self.header
    }

    /// Number of rows in the matrix.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Largest column id present in any row.
    pub fn max_col(&self) -> u32 {
        self.header.max_col
    }

    pub fn max_page_bytes(&self) -> usize {
        self.header.max_page_bytes as usize
    }

    pub fn contains(&self, row_id: u32) -> bool {
        self.by_id.contains_key(&row_id)
    }

    /// Row ids in ascending order.
    pub fn row_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.iter().map(|loc| loc.row_id)
    }

    /// Look up one row by id.
    pub fn get_row(&self, row_id: u32) -> Result<SparseRow, MatrixError> {
        let pos = *self
            .by_id
            .get(&row_id)
            .ok_or(MatrixError::NotFound(row_id))?;
        self.row_at(self.index[pos])
    }

    /// All rows in ascending id order, crossing page boundaries as needed.
    /// Yields identical results in eager and lazy mode.
    pub fn iter(&self) -> impl Iterator<Item = Result<SparseRow, MatrixError>> + '_ {
        self.index.iter().map(move |loc| self.row_at(*loc))
    }

    /// Cache counters; `None` for eager readers.
    pub fn cache_stats(&self) -> Option<PageCacheStats> {
        match &self.residency {
            Residency::Eager(_) => None,
            Residency::Lazy(cache) => Some(cache.lock().stats),
        }
    }

    fn row_at(&self, loc: RowLocation) -> Result<SparseRow, MatrixError> {
        let page = self.page(loc.page)?;
        let start = loc.offset as usize;
        let end = start + loc.len as usize;
        if end > page.len() {
            return Err(MatrixError::Malformed(format!(
                "row {} extends past its page",
                loc.row_id
            )));
        }
        SparseRow::decode(&page[start..end])
    }

    fn page(&self, page_no: u32) -> Result<Arc<Vec<u8>>, MatrixError> {
        match &self.residency {
            Residency::Eager(resident) => resident
                .get(page_no as usize)
                .map(Arc::clone)
                .ok_or_else(|| {
                    MatrixError::Malformed(format!("row references missing page {page_no}"))
                }),
            Residency::Lazy(cache) => {
                if let Some(bytes) = cache.lock().get(page_no) {
                    return Ok(bytes);
                }
                // Fault the page in outside any cached state, then publish.
                let span = self.pages.get(page_no as usize).ok_or_else(|| {
                    MatrixError::Malformed(format!("row references missing page {page_no}"))
                })?;
                let bytes = Arc::new(page_bytes(&self.mmap, span, page_no)?.to_vec());
                cache.lock().insert(page_no, Arc::clone(&bytes));
                Ok(bytes)
            }
        }
    }
}

fn page_bytes<'a>(mmap: &'a Mmap, span: &PageSpan, page_no: u32) -> Result<&'a [u8], MatrixError> {
    let start = span.offset as usize;
    let end = start + span.len as usize;
    if end > mmap.len() {
        return Err(MatrixError::Malformed(format!(
            "page {page_no} extends past end of file"
        )));
    }
    Ok(&mmap[start..end])
}
