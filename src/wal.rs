use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Append-only journal file.
///
/// Entry layout: `[u32 le: payload len][bincode Event][u32 le: crc32 of payload]`.
/// A torn or corrupt tail (crash mid-write) ends replay at the last good entry.
///
/// Writes go out one batch at a time. A batch that fails to write or sync is
/// cut back off the file, so the log only ever holds acknowledged entries. If
/// that cut fails too, the log is poisoned and refuses appends until a
/// successful [`Wal::rewrite`].
pub struct Wal {
    file: File,
    path: PathBuf,
    /// File length after the last acknowledged batch.
    committed_len: u64,
    poisoned: bool,
    appends_since_compact: u64,
    #[cfg(test)]
    fail_after_bytes: Option<usize>,
}

fn write_entry(out: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "journal entry too large"))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

/// Fill `buf` completely. `Ok(false)` on a clean or torn EOF.
fn read_full(input: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match input.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read one entry and its size on disk, given the bytes left in the file.
/// `Ok(None)` once the log ends or turns to garbage.
fn read_entry(input: &mut impl Read, remaining: u64) -> io::Result<Option<(Event, u64)>> {
    let mut word = [0u8; 4];
    if !read_full(input, &mut word)? {
        return Ok(None);
    }
    let len = u64::from(u32::from_le_bytes(word));
    let size = len + 8;
    if size > remaining {
        return Ok(None);
    }
    let mut payload = vec![0u8; len as usize];
    if !read_full(input, &mut payload)? || !read_full(input, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload).ok().map(|event| (event, size)))
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = open_append(path)?;
        let committed_len = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            committed_len,
            poisoned: false,
            appends_since_compact: 0,
            #[cfg(test)]
            fail_after_bytes: None,
        })
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Write and fsync a batch. On `Err` none of the batch is left in the
    /// file.
    pub fn commit<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("journal poisoned by an earlier failed repair"));
        }
        let mut buf = Vec::new();
        let mut count = 0u64;
        for event in events {
            write_entry(&mut buf, event)?;
            count += 1;
        }
        match self.write_synced(&buf) {
            Ok(()) => {
                self.committed_len += buf.len() as u64;
                self.appends_since_compact += count;
                Ok(())
            }
            Err(e) => {
                self.roll_back();
                Err(e)
            }
        }
    }

    fn write_synced(&mut self, buf: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        if let Some(limit) = self.fail_after_bytes.take() {
            self.file.write_all(&buf[..limit.min(buf.len())])?;
            return Err(io::Error::other("injected write failure"));
        }
        self.file.write_all(buf)?;
        self.file.sync_all()
    }

    /// Cut the file back to the last acknowledged batch.
    fn roll_back(&mut self) {
        let repaired = self
            .file
            .set_len(self.committed_len)
            .and_then(|()| self.file.sync_all());
        if let Err(e) = repaired {
            tracing::error!(
                "journal {}: cannot truncate failed batch, refusing further appends: {e}",
                self.path.display()
            );
            self.poisoned = true;
        }
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.commit(std::iter::once(event))
    }

    /// Replace the log with `events`: write a synced temp file, then rename it
    /// over the live file and reopen for appends. Clears a poisoned log.
    pub fn rewrite(&mut self, events: &[Event]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp_path)?);
            for event in events {
                write_entry(&mut out, event)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        self.file = open_append(&self.path)?;
        self.committed_len = self.file.metadata()?.len();
        self.poisoned = false;
        self.appends_since_compact = 0;
        Ok(())
    }

    /// All intact entries, oldest first. A missing file is an empty log.
    ///
    /// A damaged tail is cut off so later appends don't land behind it.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let total = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut good = 0u64;
        while let Some((event, size)) = read_entry(&mut reader, total - good)? {
            events.push(event);
            good += size;
        }
        if good < total {
            tracing::warn!(
                "journal {}: dropping {} damaged trailing bytes",
                path.display(),
                total - good
            );
            OpenOptions::new().write(true).open(path)?.set_len(good)?;
        }
        Ok(events)
    }
}
