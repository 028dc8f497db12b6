//! Fixed-column trace file reader
//!
//! Two kinds of records matter; every other line is skipped:
//!
//! ```text
//! EIP (04): 7c809767 83ec10          sub esp, 0x10
//! dstM: 0012ff70 00000000    srcM: 00000000 --------
//! ```
//!
//! An `EIP` record is one instruction fetch
//! (length in decimal, address in hex).
//! A `dstM` record carries up to two operand addresses; an operand is absent
//! when its data column starts with `-` or its address is all zeroes.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use crate::error::TraceError;
use crate::memory::AccessEvent;

const FETCH_PREFIX: &str = "EIP";
const OPERAND_PREFIX: &str = "dstM";

const FETCH_LENGTH: (usize, usize) = (5, 7);
const FETCH_ADDRESS: (usize, usize) = (10, 18);
const DESTINATION_ADDRESS: (usize, usize) = (6, 14);
const DESTINATION_DATA: usize = 15;
const SOURCE_ADDRESS: (usize, usize) = (33, 41);
const SOURCE_DATA: usize = 44;

const NO_ADDRESS: &str = "00000000";

/// One meaningful line of a trace
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceRecord {
    Instruction { address: u32, length: u32 },
    Operands { destination: Option<u32>, source: Option<u32> },
}

impl TraceRecord {
    pub fn is_instruction(&self) -> bool {
        matches!(self, TraceRecord::Instruction { .. })
    }

    /// The access events this record produces, in replay order
    pub fn events(self) -> impl Iterator<Item = AccessEvent> {
        let (first, second) = match self {
            TraceRecord::Instruction { address, length } => {
                (AccessEvent::Fetch { address, length }, None)
            }
            TraceRecord::Operands {
                destination,
                source,
            } => (
                AccessEvent::Data {
                    address: destination,
                },
                Some(AccessEvent::Data { address: source }),
            ),
        };
        std::iter::once(first).chain(second)
    }
}

fn column(line: &str, (begin, end): (usize, usize)) -> Result<&str, String> {
    line.get(begin..end).ok_or_else(|| {
        format!("record too short, expected columns {}..{}", begin, end)
    })
}

fn parse_hex(field: &str) -> Result<u32, String> {
    u32::from_str_radix(field, 16)
        .map_err(|_| format!("invalid hexadecimal address '{}'", field))
}

fn parse_operand(
    line: &str,
    address: (usize, usize),
    data: usize,
) -> Result<Option<u32>, String> {
    let field = column(line, address)?;
    let marker = column(line, (data, data + 1))?;
    if marker == "-" || field == NO_ADDRESS {
        Ok(None)
    } else {
        parse_hex(field).map(Some)
    }
}

/// Parse one trace line; `Ok(None)` for lines that carry no access
pub fn parse_line(line: &str) -> Result<Option<TraceRecord>, String> {
    if line.starts_with(FETCH_PREFIX) {
        let length_field = column(line, FETCH_LENGTH)?;
        let length = length_field.parse::<u32>().map_err(|_| {
            format!("invalid instruction length '{}'", length_field)
        })?;
        let address = parse_hex(column(line, FETCH_ADDRESS)?)?;
        Ok(Some(TraceRecord::Instruction { address, length }))
    } else if line.starts_with(OPERAND_PREFIX) {
        let destination =
            parse_operand(line, DESTINATION_ADDRESS, DESTINATION_DATA)?;
        let source = parse_operand(line, SOURCE_ADDRESS, SOURCE_DATA)?;
        Ok(Some(TraceRecord::Operands {
            destination,
            source,
        }))
    } else {
        Ok(None)
    }
}

/// Reads trace records lazily, tagging errors with file and line
pub struct TraceReader<R> {
    path: PathBuf,
    lines: Lines<R>,
    line_num: usize,
}

impl TraceReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, TraceError> {
        let file = File::open(path)
            .map_err(|e| TraceError::FileReadError(path.to_path_buf(), e))?;
        Ok(Self::new(path, BufReader::new(file)))
    }
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(path: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            path: path.into(),
            lines: reader.lines(),
            line_num: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceRecord, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(TraceError::FileReadError(
                        self.path.clone(),
                        e,
                    )))
                }
            };
            self.line_num += 1;

            match parse_line(&line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(reason) => {
                    return Some(Err(TraceError::ParseError {
                        path: self.path.clone(),
                        line: self.line_num,
                        reason,
                    }))
                }
            }
        }
    }
}
