//! Error-tolerant raw copy between devices and image files.
//!
//! Data moves in fixed-size blocks. A block that cannot be read is written as
//! zeros, and a block that cannot be written is skipped. Either way the next
//! block lands at the same offset it has in the source, so a failing disk
//! still yields an image whose layout matches the original.
//!
//! A full destination, or one that rejects every single block, is not a bad
//! sector but a failed copy, and is returned as an error.
use crate::config::DEFAULT_BLOCK_SIZE;
use crate::host::CopyStats;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::warn;

/// The native [`crate::host::BulkCopier`] implementation.
#[derive(Clone, Copy, Debug)]
pub struct BlockCopier {
    block_size: usize,
}

impl Default for BlockCopier {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

impl BlockCopier {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Copies `len` bytes from the file or device at `from` into `to`.
    ///
    /// A regular-file destination is created and truncated. A block device is
    /// opened for writing only and never truncated.
    pub fn copy_path<F>(&self, from: &Path, to: &Path, len: u64, on_progress: F) -> io::Result<CopyStats>
    where
        F: FnMut(u64),
    {
        let mut reader = File::open(from)?;
        let mut writer = open_destination(to)?;

        let stats = self.copy_stream(&mut reader, &mut writer, len, on_progress)?;
        writer.sync_all()?;
        Ok(stats)
    }

    /// Copies `len` bytes from `reader` to `writer`, block by block.
    ///
    /// Both sides are repositioned before every block. A failed read or write
    /// therefore never shifts later data. Stops early only if `reader`
    /// reaches end of stream before `len`.
    ///
    /// # Errors
    ///
    /// Fails on a seek or flush error, when the destination runs out of space,
    /// and when no block at all could be written.
    pub fn copy_stream<R, W, F>(
        &self,
        reader: &mut R,
        writer: &mut W,
        len: u64,
        mut on_progress: F,
    ) -> io::Result<CopyStats>
    where
        R: Read + Seek,
        W: Write + Seek,
        F: FnMut(u64),
    {
        let mut buffer = vec![0u8; self.block_size];
        let mut stats = CopyStats::default();
        let mut blocks: u64 = 0;

        while stats.bytes < len {
            let offset = stats.bytes;
            let want = std::cmp::min(self.block_size as u64, len - offset) as usize;
            let chunk = &mut buffer[..want];

            reader.seek(SeekFrom::Start(offset))?;
            let got = match fill_block(reader, chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!("Read error at offset {offset}: {e}; writing {want} zero bytes");
                    chunk.fill(0);
                    stats.zero_filled_blocks += 1;
                    want
                }
            };

            writer.seek(SeekFrom::Start(offset))?;
            blocks += 1;
            match writer.write_all(&chunk[..got]) {
                Ok(()) => {}
                Err(e) if is_fatal_write(&e) => {
                    return Err(io::Error::new(
                        e.kind(),
                        format!("destination full at offset {offset}: {e}"),
                    ));
                }
                Err(e) => {
                    warn!("Write error at offset {offset}: {e}; skipping {got} bytes");
                    stats.skipped_blocks += 1;
                }
            }

            stats.bytes += got as u64;
            on_progress(stats.bytes);

            // A short read means the source ended early.
            if got < want {
                break;
            }
        }

        if blocks > 0 && stats.skipped_blocks == blocks {
            return Err(io::Error::other(format!(
                "none of {blocks} blocks could be written to the destination"
            )));
        }

        writer.flush()?;
        Ok(stats)
    }
}

/// Write errors that no later block can recover from.
fn is_fatal_write(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::StorageFull | io::ErrorKind::WriteZero
    )
}

/// Reads until `buf` is full or the reader hits end of stream.
fn fill_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn open_destination(path: &Path) -> io::Result<File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if let Ok(meta) = std::fs::metadata(path) {
            if meta.file_type().is_block_device() {
                return OpenOptions::new().write(true).open(path);
            }
        }
    }

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
