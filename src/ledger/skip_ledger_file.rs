//! File-backed [`SkipLedger`], twinning an input-hash file with a
//! level-hash cell file the same way the teacher's `ChainStorage` twins a
//! `.data` file with a `.hashchain` file — here `<base>.inputs` and
//! `<base>.cells`, plus a tiny `<base>.size` commit marker. Reads of
//! either file go through a lazily-initialized [`memmap2::Mmap`], the
//! same `mmap: Option<Mmap>` + `init_mmap`/`close_mmap` pattern the
//! teacher's `ChainStorage` uses; an append closes both maps so the next
//! read remaps over the new, larger file.
//!
//! Appends write the new row's input hash and level cells first, flush
//! them, then overwrite the size marker last — the ordering §5 requires
//! so a crash never exposes a partially-written row. On open, any bytes
//! past the committed size are truncated away.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path as FsPath, PathBuf};

use memmap2::Mmap;

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::{Hash, SENTINEL};
use crate::core::logging::PerformanceTimer;
use crate::core::row_math::{self, skip_count};
use crate::ledger::row::{LevelsPointer, Row};
use crate::ledger::skip_ledger::SkipLedger;

pub struct SkipLedgerFile {
    pub inputs_path: PathBuf,
    pub cells_path: PathBuf,
    pub size_path: PathBuf,
    inputs_file: RefCell<File>,
    cells_file: RefCell<File>,
    size_file: File,
    inputs_mmap: RefCell<Option<Mmap>>,
    cells_mmap: RefCell<Option<Mmap>>,
    size: u64,
}

impl SkipLedgerFile {
    /// Open (creating if absent) the three sibling files rooted at `base`,
    /// recovering to the last durably-committed size.
    pub fn open(base: impl AsRef<FsPath>) -> SkResult<Self> {
        let _timer = PerformanceTimer::new("SkipLedgerFile::open");
        let base = base.as_ref();
        let inputs_path = with_ext(base, "inputs");
        let cells_path = with_ext(base, "cells");
        let size_path = with_ext(base, "size");

        let mut inputs_file = open_rw(&inputs_path)?;
        let mut cells_file = open_rw(&cells_path)?;
        let mut size_file = open_rw(&size_path)?;

        let size = read_committed_size(&mut size_file)?;

        let input_bytes = size * Hash::LEN as u64;
        inputs_file.set_len(input_bytes).map_err(SkError::Io)?;
        let cell_bytes = row_math::cell_number(size + 1) * Hash::LEN as u64;
        cells_file.set_len(cell_bytes).map_err(SkError::Io)?;

        Ok(SkipLedgerFile {
            inputs_path,
            cells_path,
            size_path,
            inputs_file: RefCell::new(inputs_file),
            cells_file: RefCell::new(cells_file),
            size_file,
            inputs_mmap: RefCell::new(None),
            cells_mmap: RefCell::new(None),
            size,
        })
    }

    /// Drop both maps so the next read remaps over the current file
    /// contents. Called after every append, since the files just grew.
    fn close_mmaps(&self) {
        self.inputs_mmap.borrow_mut().take();
        self.cells_mmap.borrow_mut().take();
    }

    fn write_committed_size(&mut self, size: u64) -> SkResult<()> {
        self.size_file.seek(SeekFrom::Start(0)).map_err(SkError::Io)?;
        self.size_file.write_all(&size.to_be_bytes()).map_err(SkError::Io)?;
        self.size_file.flush().map_err(SkError::Io)?;
        self.size_file.sync_all().map_err(SkError::Io)?;
        Ok(())
    }

    fn read_cell(&self, cell_index: u64) -> SkResult<Hash> {
        self.read_hash_at(&self.cells_file, &self.cells_mmap, cell_index)
    }

    fn read_input(&self, n: u64) -> SkResult<Hash> {
        self.read_hash_at(&self.inputs_file, &self.inputs_mmap, n - 1)
    }

    /// Map `file` on first use (or after the previous map was invalidated
    /// by an append) and read the 32-byte hash at `index`.
    fn read_hash_at(&self, file: &RefCell<File>, mmap: &RefCell<Option<Mmap>>, index: u64) -> SkResult<Hash> {
        if mmap.borrow().is_none() {
            let file = file.borrow();
            let mapped = if file.metadata().map_err(SkError::Io)?.len() == 0 {
                None
            } else {
                Some(unsafe { Mmap::map(&*file) }.map_err(SkError::Io)?)
            };
            *mmap.borrow_mut() = mapped;
        }

        let start = (index * Hash::LEN as u64) as usize;
        let end = start + Hash::LEN;
        let guard = mmap.borrow();
        let bytes = guard
            .as_ref()
            .and_then(|m| m.get(start..end))
            .ok_or_else(|| SkError::serial(format!("cell index {index} out of range of memory-mapped file")))?;
        Ok(Hash::from_slice(bytes).expect("32-byte slice"))
    }
}

fn with_ext(base: &FsPath, ext: &str) -> PathBuf {
    let mut p = base.to_path_buf();
    let file_name = p
        .file_name()
        .map(|n| format!("{}.{}", n.to_string_lossy(), ext))
        .unwrap_or_else(|| format!("ledger.{ext}"));
    p.set_file_name(file_name);
    p
}

fn open_rw(path: &FsPath) -> SkResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(SkError::Io)
}

fn read_committed_size(size_file: &mut File) -> SkResult<u64> {
    let mut buf = [0u8; 8];
    size_file.seek(SeekFrom::Start(0)).map_err(SkError::Io)?;
    match size_file.read_exact(&mut buf) {
        Ok(()) => Ok(u64::from_be_bytes(buf)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
        Err(e) => Err(SkError::Io(e)),
    }
}

impl SkipLedger for SkipLedgerFile {
    fn size(&self) -> u64 {
        self.size
    }

    fn append_rows(&mut self, input_hashes: &[Hash]) -> SkResult<u64> {
        let _timer = PerformanceTimer::new("SkipLedgerFile::append_rows");
        for &ih in input_hashes {
            let n = self.size + 1;
            let p = skip_count(n) as usize;
            let mut levels = Vec::with_capacity(p);
            for k in 0..p {
                let step = 1u64 << k;
                let pred_hash = if n > step {
                    self.get_row(n - step)?.hash()
                } else {
                    SENTINEL
                };
                levels.push(pred_hash);
            }

            {
                let mut inputs_file = self.inputs_file.borrow_mut();
                inputs_file.seek(SeekFrom::End(0)).map_err(SkError::Io)?;
                inputs_file.write_all(ih.as_bytes()).map_err(SkError::Io)?;
                inputs_file.flush().map_err(SkError::Io)?;
            }
            {
                let mut cells_file = self.cells_file.borrow_mut();
                cells_file.seek(SeekFrom::End(0)).map_err(SkError::Io)?;
                for h in &levels {
                    cells_file.write_all(h.as_bytes()).map_err(SkError::Io)?;
                }
                cells_file.flush().map_err(SkError::Io)?;
            }
            self.close_mmaps();

            self.size = n;
            self.write_committed_size(n)?;
        }
        Ok(self.size)
    }

    fn get_row(&self, n: u64) -> SkResult<Row> {
        if n < 1 || n > self.size {
            return Err(SkError::RowNotFound(n));
        }
        let p = skip_count(n) as usize;
        let offset = row_math::cell_number(n);
        let mut levels = Vec::with_capacity(p);
        for i in 0..p as u64 {
            levels.push(self.read_cell(offset + i)?);
        }
        let input_hash = self.read_input(n)?;
        Ok(Row::new(n, input_hash, LevelsPointer::full(levels)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;
    use tempfile::tempdir;

    fn input(i: u64) -> Hash {
        sha256(&i.to_be_bytes())
    }

    #[test]
    fn append_and_reopen_round_trips() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("ledger");
        {
            let mut ledger = SkipLedgerFile::open(&base).unwrap();
            let inputs: Vec<Hash> = (0..20).map(input).collect();
            ledger.append_rows(&inputs).unwrap();
            assert_eq!(ledger.size(), 20);
        }
        let mut reopened = SkipLedgerFile::open(&base).unwrap();
        assert_eq!(reopened.size(), 20);
        let row = reopened.get_row(20).unwrap();
        assert_eq!(row.input_hash, input(19));
    }

    #[test]
    fn matches_in_memory_ledger_hashes() {
        use crate::ledger::skip_ledger::MemSkipLedger;

        let dir = tempdir().unwrap();
        let base = dir.path().join("ledger");
        let inputs: Vec<Hash> = (0..30).map(input).collect();

        let mut file_ledger = SkipLedgerFile::open(&base).unwrap();
        file_ledger.append_rows(&inputs).unwrap();

        let mut mem_ledger = MemSkipLedger::new();
        mem_ledger.append_rows(&inputs).unwrap();

        for n in 1..=30u64 {
            assert_eq!(file_ledger.row_hash(n).unwrap(), mem_ledger.row_hash(n).unwrap());
        }
    }
}
