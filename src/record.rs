//! Record codec for the solver's binary field files
//!
//! A record is a flat buffer of IEEE-754 doubles in native byte order,
//! element order column-major. Two framings exist:
//!
//! - **Raw**: the payload only, fixed size. Record `t` of a file starts at
//!   byte `t * record_size`, so any timestep can be read without touching
//!   earlier ones. Used by the multi-processor driver files.
//! - **Bracketed**: the payload is preceded and followed by a 4-byte integer
//!   holding the payload length in bytes, the legacy unformatted sequential
//!   record convention. Used by restart files.
//!
//! The codec knows nothing about grids; callers supply shapes.

use crate::errors::{FieldIoError, Result};
use byteorder::{ByteOrder, NativeEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn, ShapeBuilder};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Bytes per stored value
pub const VALUE_SIZE: usize = 8;

/// Bytes per bracketed-mode length marker
pub const MARKER_SIZE: usize = 4;

/// Framing of records inside a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Raw,
    Bracketed,
}

impl Framing {
    /// Bytes occupied on disk by a record carrying `payload_bytes`
    #[must_use]
    pub const fn framed_size(self, payload_bytes: usize) -> usize {
        match self {
            Self::Raw => payload_bytes,
            Self::Bracketed => payload_bytes + 2 * MARKER_SIZE,
        }
    }
}

/// Encodes values as native-endian doubles
#[must_use]
pub fn encode_values(values: &[f64]) -> Vec<u8> {
    let mut bytes = vec![0_u8; values.len() * VALUE_SIZE];
    NativeEndian::write_f64_into(values, &mut bytes);
    bytes
}

/// Decodes native-endian doubles
///
/// # Errors
///
/// Returns a configuration error if `bytes` is not a whole number of values.
pub fn decode_values(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % VALUE_SIZE != 0 {
        return Err(FieldIoError::config(format!(
            "Payload of {} bytes is not a whole number of {VALUE_SIZE}-byte values",
            bytes.len()
        )));
    }
    let mut values = vec![0.0_f64; bytes.len() / VALUE_SIZE];
    NativeEndian::read_f64_into(bytes, &mut values);
    Ok(values)
}

/// Flattens an array in column-major (first index fastest) order
pub fn to_fortran_values<S, D>(array: &ArrayBase<S, D>) -> Vec<f64>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    array.t().iter().copied().collect()
}

/// Rebuilds an array from column-major values
pub fn from_fortran_values(shape: &[usize], values: Vec<f64>) -> Result<ArrayD<f64>> {
    Ok(ArrayD::from_shape_vec(IxDyn(shape).f(), values)?)
}

/// Writes one bracketed record: marker, payload, marker.
pub fn write_bracketed<W: Write>(writer: &mut W, values: &[f64]) -> Result<()> {
    let payload = encode_values(values);
    let marker = i32::try_from(payload.len()).map_err(|_| {
        FieldIoError::config(format!(
            "Record of {} bytes exceeds the 4-byte length marker",
            payload.len()
        ))
    })?;

    writer.write_i32::<NativeEndian>(marker)?;
    writer.write_all(&payload)?;
    writer.write_i32::<NativeEndian>(marker)?;
    Ok(())
}

/// Reads one bracketed record, verifying that both markers agree.
///
/// Returns `Ok(None)` only when the stream ends exactly before a leading
/// marker. Any shorter remainder is a [`FieldIoError::CorruptRecord`].
pub fn read_bracketed<R: Read>(reader: &mut R) -> Result<Option<Vec<f64>>> {
    let mut marker = [0_u8; MARKER_SIZE];
    match fill_from(reader, &mut marker)? {
        0 => return Ok(None),
        MARKER_SIZE => {}
        _ => {
            return Err(FieldIoError::CorruptRecord {
                leading: -1,
                trailing: -1,
            })
        }
    }
    let leading = NativeEndian::read_i32(&marker);
    let payload_len = usize::try_from(leading).map_err(|_| FieldIoError::CorruptRecord {
        leading: i64::from(leading),
        trailing: -1,
    })?;

    let mut payload = vec![0_u8; payload_len];
    reader
        .read_exact(&mut payload)
        .map_err(|e| truncated(e, leading))?;
    let trailing = reader
        .read_i32::<NativeEndian>()
        .map_err(|e| truncated(e, leading))?;

    if leading != trailing {
        return Err(FieldIoError::CorruptRecord {
            leading: i64::from(leading),
            trailing: i64::from(trailing),
        });
    }

    decode_values(&payload).map(Some)
}

/// Reads until `buf` is full or the stream ends, returning the bytes read
fn fill_from<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn truncated(error: std::io::Error, leading: i32) -> FieldIoError {
    if error.kind() == ErrorKind::UnexpectedEof {
        FieldIoError::CorruptRecord {
            leading: i64::from(leading),
            trailing: -1,
        }
    } else {
        error.into()
    }
}

/// Reads every bracketed record of a file in order
pub fn read_bracketed_file(path: &Path) -> Result<Vec<Vec<f64>>> {
    let file = open_existing(path)?;
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    while let Some(record) = read_bracketed(&mut reader)? {
        records.push(record);
    }
    Ok(records)
}

/// Sequential writer of bracketed records to one file
pub struct BracketedWriter {
    path: PathBuf,
    inner: BufWriter<File>,
    records: usize,
}

impl BracketedWriter {
    /// Create (or truncate) the file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: BufWriter::new(file),
            records: 0,
        })
    }

    /// Append one array as a record, column-major
    pub fn write_array<S, D>(&mut self, array: &ArrayBase<S, D>) -> Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.write_values(&to_fortran_values(array))
    }

    pub fn write_values(&mut self, values: &[f64]) -> Result<()> {
        write_bracketed(&mut self.inner, values)?;
        self.records += 1;
        Ok(())
    }

    /// Flush and close, returning the file path
    pub fn finish(mut self) -> Result<PathBuf> {
        self.inner.flush()?;
        tracing::debug!(path = %self.path.display(), records = self.records, "closed record file");
        Ok(self.path)
    }
}

/// Random-access reader over a file of fixed-size raw records
#[derive(Debug)]
pub struct RawRecordFile {
    path: PathBuf,
    file: File,
    record_size: usize,
    file_size: u64,
}

impl RawRecordFile {
    /// Open an existing raw record file
    ///
    /// # Errors
    ///
    /// Returns [`FieldIoError::FileNotFound`] if `path` is absent.
    pub fn open(path: &Path, record_size: usize) -> Result<Self> {
        if record_size == 0 || record_size % VALUE_SIZE != 0 {
            return Err(FieldIoError::config(format!(
                "Raw record size must be a positive multiple of {VALUE_SIZE}, got {record_size}"
            )));
        }
        let file = open_existing(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            record_size,
            file_size,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of complete records in the file
    #[must_use]
    pub fn record_count(&self) -> usize {
        usize::try_from(self.file_size).unwrap_or(usize::MAX) / self.record_size
    }

    /// Fails unless records `0..end` are all present.
    ///
    /// # Errors
    ///
    /// Returns [`FieldIoError::IncompleteRecord`] for the first missing
    /// record, with the bytes actually left at its offset.
    pub fn ensure_records(&self, end: usize) -> Result<()> {
        let available = self.record_count();
        if end <= available {
            return Ok(());
        }
        let offset = (available as u64) * (self.record_size as u64);
        let left = self.file_size.saturating_sub(offset);
        Err(FieldIoError::IncompleteRecord {
            path: self.path.clone(),
            timestep: available,
            expected: self.record_size,
            actual: usize::try_from(left).unwrap_or(self.record_size),
        })
    }

    /// Read record `index` by seeking to `index * record_size`
    ///
    /// # Errors
    ///
    /// Returns [`FieldIoError::IncompleteRecord`] when fewer than
    /// `record_size` bytes are available at that offset.
    pub fn read_record(&mut self, index: usize) -> Result<Vec<f64>> {
        let offset = (index as u64) * (self.record_size as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let mut bytes = Vec::with_capacity(self.record_size);
        (&mut self.file)
            .take(self.record_size as u64)
            .read_to_end(&mut bytes)?;

        if bytes.len() < self.record_size {
            return Err(FieldIoError::IncompleteRecord {
                path: self.path.clone(),
                timestep: index,
                expected: self.record_size,
                actual: bytes.len(),
            });
        }
        decode_values(&bytes)
    }
}

/// Appending writer of raw records, used to produce driver-style files
pub struct RawRecordWriter {
    inner: BufWriter<File>,
    record_size: usize,
}

impl RawRecordWriter {
    /// Create (or truncate) a raw record file
    pub fn create(path: &Path, record_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            inner: BufWriter::new(file),
            record_size,
        })
    }

    /// Append one record; its length must match the configured record size
    pub fn write_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() * VALUE_SIZE != self.record_size {
            return Err(FieldIoError::config(format!(
                "Record holds {} bytes, expected {}",
                values.len() * VALUE_SIZE,
                self.record_size
            )));
        }
        self.inner.write_all(&encode_values(values))?;
        Ok(())
    }

    pub fn write_array<S, D>(&mut self, array: &ArrayBase<S, D>) -> Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.write_values(&to_fortran_values(array))
    }

    pub fn finish(mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Reads a whole file of unframed doubles
pub fn read_flat_values(path: &Path) -> Result<Vec<f64>> {
    let mut file = open_existing(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let whole = bytes.len() - bytes.len() % VALUE_SIZE;
    decode_values(&bytes[..whole])
}

fn open_existing(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            FieldIoError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            FieldIoError::Io(e)
        }
    })
}
