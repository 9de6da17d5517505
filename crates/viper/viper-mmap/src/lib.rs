//! File-backed shared mappings used for host/OS sessions.

use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// A read-write `MAP_SHARED` view of a whole file. Every process mapping the
/// same file sees the same bytes.
pub struct SharedMap {
    path: PathBuf,
    // Keeps the descriptor alive for the lifetime of the map.
    _file: File,
    map: MmapMut,
}

impl SharedMap {
    /// Creates `path` (truncating any previous content), sizes it to `len`
    /// zeroed bytes and maps it.
    pub fn create<P: AsRef<Path>>(path: P, len: u64) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map an empty region",
            ));
        }
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(len)?;
        Self::map(path, file)
    }

    /// Maps an existing, non-empty file.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "mapped file is empty",
            ));
        }
        Self::map(path, file)
    }

    fn map(path: &Path, file: File) -> io::Result<Self> {
        // SAFETY: the file stays open as long as the map. Other processes may
        // change the bytes underneath; callers only touch them through raw
        // pointers and atomics, never through `&[u8]`.
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
            map,
        })
    }

    /// Start of the mapping.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.map.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("viper_mmap_{tag}_{}", std::process::id()))
    }

    #[test]
    fn two_maps_of_one_file_share_bytes() {
        let path = temp("share");

        let mut a = SharedMap::create(&path, 64).expect("create");
        assert_eq!(a.len(), 64);
        unsafe { a.as_mut_ptr().add(3).write(0xAB) };

        let mut b = SharedMap::open(&path).expect("open");
        assert_eq!(b.len(), 64);
        assert_eq!(b.path(), path.as_path());
        assert_eq!(unsafe { b.as_mut_ptr().add(3).read() }, 0xAB);

        drop((a, b));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_regions_are_refused() {
        let path = temp("empty");
        let err = SharedMap::create(&path, 0).err().expect("zero length accepted");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        std::fs::write(&path, b"").expect("touch");
        let err = SharedMap::open(&path).err().expect("empty file accepted");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        let _ = std::fs::remove_file(&path);
    }
}
