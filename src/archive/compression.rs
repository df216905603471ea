//! Stream compressors selectable by name

use crate::error::{BackupError, Result};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compressor {
    #[default]
    Gzip,
    Bzip2,
}

impl Compressor {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Compressor::Gzip),
            "bzip2" => Ok(Compressor::Bzip2),
            other => Err(BackupError::config(format!(
                "unknown compression format: '{}' (expected gzip or bzip2)",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Compressor::Gzip => "gzip",
            Compressor::Bzip2 => "bzip2",
        }
    }

    /// File extension of a tar container compressed with this algorithm
    pub fn extension(&self) -> &'static str {
        match self {
            Compressor::Gzip => "tgz",
            Compressor::Bzip2 => "tbz2",
        }
    }

    pub fn compress<W: Write>(&self, writer: W) -> CompressWriter<W> {
        match self {
            Compressor::Gzip => {
                CompressWriter::Gzip(GzEncoder::new(writer, flate2::Compression::default()))
            }
            Compressor::Bzip2 => {
                CompressWriter::Bzip2(BzEncoder::new(writer, bzip2::Compression::default()))
            }
        }
    }

    pub fn uncompress<R: Read>(&self, reader: R) -> DecompressReader<R> {
        match self {
            Compressor::Gzip => DecompressReader::Gzip(GzDecoder::new(reader)),
            Compressor::Bzip2 => DecompressReader::Bzip2(BzDecoder::new(reader)),
        }
    }
}

impl FromStr for Compressor {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub enum CompressWriter<W: Write> {
    Gzip(GzEncoder<W>),
    Bzip2(BzEncoder<W>),
}

impl<W: Write> CompressWriter<W> {
    /// Flush the trailer and hand back the inner writer
    pub fn finish(self) -> io::Result<W> {
        match self {
            CompressWriter::Gzip(enc) => enc.finish(),
            CompressWriter::Bzip2(enc) => enc.finish(),
        }
    }
}

impl<W: Write> Write for CompressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressWriter::Gzip(enc) => enc.write(buf),
            CompressWriter::Bzip2(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressWriter::Gzip(enc) => enc.flush(),
            CompressWriter::Bzip2(enc) => enc.flush(),
        }
    }
}

pub enum DecompressReader<R: Read> {
    Gzip(GzDecoder<R>),
    Bzip2(BzDecoder<R>),
}

impl<R: Read> Read for DecompressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DecompressReader::Gzip(dec) => dec.read(buf),
            DecompressReader::Bzip2(dec) => dec.read(buf),
        }
    }
}
