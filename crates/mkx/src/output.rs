//! Output files shared between extractors.
//!
//! Every distinct output path is opened once and owned by the arena. The
//! extractor that opened it is the master; followers writing to the same
//! path only hold its [`FileId`]. Closing is idempotent, so a file is
//! physically closed exactly once.

use std::{
    fs::File,
    io::{self, BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

/// Destination of an extractor's bytes.
pub trait OutputSink: Write + Seek {
    /// Flushes and releases the underlying resource.
    fn close(&mut self) -> io::Result<()>;
}

/// Creates the sink for an output path.
pub type SinkOpener = Box<dyn FnMut(&Path) -> io::Result<Box<dyn OutputSink>>>;

/// A buffered file on disk.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Seek for FileSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.writer.seek(pos)
    }
}

impl OutputSink for FileSink {
    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}

/// Handle of a file in the [`OutputArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(usize);

struct OutputFile {
    path: PathBuf,
    container: &'static str,
    shareable: bool,
    sink: Option<Box<dyn OutputSink>>,
}

/// Owner of all output sinks of a run.
pub struct OutputArena {
    files: Vec<OutputFile>,
    opener: SinkOpener,
}

impl Default for OutputArena {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputArena {
    /// Arena writing to files on disk.
    pub fn new() -> Self {
        Self::with_opener(Box::new(|path: &Path| {
            FileSink::create(path).map(|sink| Box::new(sink) as Box<dyn OutputSink>)
        }))
    }

    pub fn with_opener(opener: SinkOpener) -> Self {
        Self {
            files: Vec::new(),
            opener,
        }
    }

    /// The file registered for `path`, if any.
    pub fn find(&self, path: &Path) -> Option<FileId> {
        self.files.iter().position(|file| file.path == path).map(FileId)
    }

    /// Opens `path` and registers it with the container its master writes.
    pub fn open(&mut self, path: &Path, container: &'static str, shareable: bool) -> io::Result<FileId> {
        let sink = (self.opener)(path)?;
        debug!(path = %path.display(), container, "Opened output file");

        self.files.push(OutputFile {
            path: path.to_path_buf(),
            container,
            shareable,
            sink: Some(sink),
        });
        Ok(FileId(self.files.len() - 1))
    }

    /// Opens a sink that is not registered in the arena, such as a cue sheet.
    pub fn create_unregistered(&mut self, path: &Path) -> io::Result<Box<dyn OutputSink>> {
        (self.opener)(path)
    }

    pub fn container(&self, id: FileId) -> &'static str {
        self.files[id.0].container
    }

    pub fn is_shareable(&self, id: FileId) -> bool {
        self.files[id.0].shareable
    }

    /// The open sink of `id`, `None` once closed.
    pub fn sink(&mut self, id: FileId) -> Option<&mut (dyn OutputSink + 'static)> {
        self.files.get_mut(id.0)?.sink.as_deref_mut()
    }

    /// Closes `id`. Returns whether this call closed it.
    pub fn close(&mut self, id: FileId) -> io::Result<bool> {
        let Some(mut sink) = self.files.get_mut(id.0).and_then(|file| file.sink.take()) else {
            return Ok(false);
        };

        sink.close()?;
        debug!(path = %self.files[id.0].path.display(), "Closed output file");
        Ok(true)
    }

    /// Closes every file still open.
    pub fn close_all(&mut self) -> io::Result<()> {
        for index in 0..self.files.len() {
            self.close(FileId(index))?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        cell::{Cell, RefCell},
        collections::HashMap,
        io::Cursor,
        rc::Rc,
    };

    use super::*;

    #[derive(Clone, Default)]
    struct MemoryFile {
        data: Rc<RefCell<Cursor<Vec<u8>>>>,
        closes: Rc<Cell<usize>>,
    }

    struct MemorySink(MemoryFile);

    impl Write for MemorySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.data.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for MemorySink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.0.data.borrow_mut().seek(pos)
        }
    }

    impl OutputSink for MemorySink {
        fn close(&mut self) -> io::Result<()> {
            self.0.closes.set(self.0.closes.get() + 1);
            Ok(())
        }
    }

    impl OutputSink for Cursor<Vec<u8>> {
        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// In-memory files keyed by path, observable after the run.
    #[derive(Clone, Default)]
    pub(crate) struct MemoryFiles {
        files: Rc<RefCell<HashMap<PathBuf, MemoryFile>>>,
    }

    impl MemoryFiles {
        pub(crate) fn opener(&self) -> SinkOpener {
            let files = self.files.clone();
            Box::new(move |path: &Path| {
                let file = MemoryFile::default();
                files.borrow_mut().insert(path.to_path_buf(), file.clone());
                Ok(Box::new(MemorySink(file)) as Box<dyn OutputSink>)
            })
        }

        pub(crate) fn contents(&self, path: &str) -> Vec<u8> {
            self.files
                .borrow()
                .get(Path::new(path))
                .map(|file| file.data.borrow().get_ref().clone())
                .unwrap_or_default()
        }

        pub(crate) fn closes(&self, path: &str) -> usize {
            self.files
                .borrow()
                .get(Path::new(path))
                .map_or(0, |file| file.closes.get())
        }

        pub(crate) fn len(&self) -> usize {
            self.files.borrow().len()
        }
    }
}
