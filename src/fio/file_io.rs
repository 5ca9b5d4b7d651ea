//! Standard file handle implementation of [`IoManager`].

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;

use super::{IoManager, SEGMENT_FILE_PERM};

/// A segment file opened for reading and appending.
#[derive(Debug)]
pub struct FileIo {
    fd: File,
}

impl FileIo {
    /// Opens `path`, creating it if missing.
    pub fn open(path: &Path) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .mode(SEGMENT_FILE_PERM)
            .open(path)?;
        Ok(Self { fd })
    }
}

impl IoManager for FileIo {
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.fd.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        // `&File` implements `Write`; append mode puts every write at EOF.
        (&self.fd).write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.fd.sync_all()
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.fd.metadata()?.len())
    }

    fn truncate(&self, len: u64) -> io::Result<()> {
        self.fd.set_len(len)
    }
}
