//! Dataset loader for the semicolon-delimited blocklist dump.
//!
//! Each line of the dump is a record whose fields are separated by `;`.
//! Field 0 holds one or more addresses or CIDR ranges separated by `|`;
//! the remaining fields (domains, URLs, authority, date...) are irrelevant
//! to the index. Records with fewer than two fields, such as the
//! `Updated: ...` banner line, are skipped.
//!
//! The dump is not guaranteed to be UTF-8, so lines are handled as bytes
//! and only field 0 is decoded.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::{Flag, PrefixIndex};

const FIELD_SEPARATOR: u8 = b';';
const ADDRESS_SEPARATOR: char = '|';

/// Outcome of parsing a single dataset line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record<'a> {
    /// Fewer than two fields; ignored.
    Skipped,
    /// Address tokens from field 0, trimmed and non-empty.
    Addresses(Vec<&'a str>),
    /// Field 0 is not valid UTF-8, so no token can be a valid address.
    Undecodable,
}

/// Split one dataset line into its address tokens.
pub fn parse_record(line: &[u8]) -> Record<'_> {
    let line = trim_line_end(line);
    let mut fields = line.split(|b| *b == FIELD_SEPARATOR);
    let first = fields.next().unwrap_or_default();
    if fields.next().is_none() {
        return Record::Skipped;
    }
    match std::str::from_utf8(first) {
        Ok(first) => Record::Addresses(
            first
                .split(ADDRESS_SEPARATOR)
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .collect(),
        ),
        Err(_) => Record::Undecodable,
    }
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    line
}

/// Counters collected while loading a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Lines read from the source.
    pub lines: usize,
    /// Lines with at least two fields.
    pub records: usize,
    /// Lines skipped for having fewer than two fields.
    pub skipped_records: usize,
    /// Networks inserted with [`Flag::Listed`].
    pub entries: usize,
    /// Address tokens that failed to parse and were skipped.
    pub malformed_tokens: usize,
}

/// Builds a [`PrefixIndex`] from raw dataset bytes.
pub struct DatasetLoader;

impl DatasetLoader {
    /// Load a dataset from a reader.
    ///
    /// Gzip-compressed input is detected by its magic bytes and
    /// decompressed on the fly.
    pub fn load<R: Read>(reader: R) -> Result<(PrefixIndex, LoadStats)> {
        let mut reader = BufReader::new(reader);
        let is_gzip = {
            let head = reader.fill_buf().map_err(source_read)?;
            head.len() >= 2 && head[0] == 0x1f && head[1] == 0x8b
        };

        if is_gzip {
            log::debug!("Dataset is gzip compressed");
            Self::load_lines(BufReader::new(GzDecoder::new(reader)), true)
        } else {
            Self::load_lines(reader, false)
        }
    }

    /// Load a dataset held in memory.
    pub fn load_bytes(data: &[u8]) -> Result<(PrefixIndex, LoadStats)> {
        Self::load(data)
    }

    /// Load a dataset from a file.
    pub fn load_file(path: &Path) -> Result<(PrefixIndex, LoadStats)> {
        let file = File::open(path)
            .map_err(|e| Error::SourceRead(format!("{}: {}", path.display(), e)))?;
        let (index, stats) = Self::load(file)?;
        log::info!(
            "Loaded {} networks from {:?} ({} records, {} skipped, {} malformed)",
            stats.entries,
            path,
            stats.records,
            stats.skipped_records,
            stats.malformed_tokens
        );
        Ok((index, stats))
    }

    fn load_lines<R: BufRead>(mut reader: R, compressed: bool) -> Result<(PrefixIndex, LoadStats)> {
        let mut index = PrefixIndex::new();
        let mut stats = LoadStats::default();
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).map_err(|e| match e.kind() {
                ErrorKind::InvalidInput | ErrorKind::InvalidData | ErrorKind::UnexpectedEof
                    if compressed =>
                {
                    Error::Parse(format!("corrupt gzip stream: {}", e))
                }
                _ => source_read(e),
            })?;
            if read == 0 {
                break;
            }
            stats.lines += 1;

            match parse_record(&line) {
                Record::Skipped => stats.skipped_records += 1,
                Record::Undecodable => {
                    stats.records += 1;
                    stats.malformed_tokens += 1;
                    log::debug!("Line {}: address field is not valid UTF-8", stats.lines);
                }
                Record::Addresses(tokens) => {
                    stats.records += 1;
                    for token in tokens {
                        match index.insert_str(token, Flag::Listed) {
                            Ok(_) => stats.entries += 1,
                            Err(_) => {
                                stats.malformed_tokens += 1;
                                log::debug!(
                                    "Line {}: skipping malformed token {:?}",
                                    stats.lines,
                                    token
                                );
                            }
                        }
                    }
                }
            }
        }

        if stats.lines > 0 && stats.records == 0 {
            log::warn!("No records found in {} lines, index holds only defaults", stats.lines);
        }
        if stats.malformed_tokens > 0 {
            log::warn!("Skipped {} malformed dataset tokens", stats.malformed_tokens);
        }

        Ok((index, stats))
    }
}

fn source_read(e: std::io::Error) -> Error {
    Error::SourceRead(e.to_string())
}
