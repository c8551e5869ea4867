use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::StoreRecord;

/// Upper bound on one encoded record; a larger length prefix is treated as corruption.
const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Frame one record as `[len][bincode][crc32]`.
fn encode_record(writer: &mut impl Write, record: &StoreRecord) -> io::Result<()> {
    let payload =
        bincode::serialize(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_RECORD_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "record too large"));
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Read one framed record and its size on disk. `Ok(None)` on a clean end
/// of file or a torn, corrupt, or undecodable frame.
fn decode_record(reader: &mut impl Read) -> io::Result<Option<(StoreRecord, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_RECORD_LEN {
        return Ok(None);
    }
    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !read_full(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    let frame_len = (len + 8) as u64;
    Ok(bincode::deserialize(&payload)
        .ok()
        .map(|record| (record, frame_len)))
}

/// `false` on EOF before the buffer is filled.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Append-only log of store mutations.
///
/// Format per entry: `[u32: len][bincode: StoreRecord][u32: crc32]`, little endian.
/// A torn last entry (crash mid-write) is dropped on replay and cut off
/// the file by [`Wal::recover`] before new appends land behind it.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    /// Open (or create) the log at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Append one record and fsync before returning.
    pub fn append(&mut self, record: &StoreRecord) -> io::Result<()> {
        encode_record(&mut self.writer, record)?;
        self.appends_since_compact += 1;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Rewrite the log as `records`: write a temp file, fsync, rename it
    /// over the log, reopen for appends.
    pub fn compact(&mut self, records: &[StoreRecord]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for record in records {
                encode_record(&mut writer, record)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// All valid records on disk, in append order. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();
        while let Some((record, frame_len)) = decode_record(&mut reader)? {
            replay.records.push(record);
            replay.valid_len += frame_len;
        }
        Ok(replay)
    }

    /// Replay the log, truncate anything past the last valid frame, then
    /// open it for appends.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<StoreRecord>)> {
        let replay = Self::replay(path)?;
        if let Ok(meta) = fs::metadata(path)
            && meta.len() > replay.valid_len
        {
            tracing::warn!(
                path = %path.display(),
                discarded = meta.len() - replay.valid_len,
                "truncating corrupt WAL tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }
        Ok((Self::open(path)?, replay.records))
    }
}

/// Result of scanning a log: the decodable records and the byte length
/// they occupy from the start of the file.
#[derive(Debug, Default)]
pub struct Replay {
    pub records: Vec<StoreRecord>,
    pub valid_len: u64,
}
