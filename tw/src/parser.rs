//! Delimited text <-> RecordSet conversion
//!
//! One row per line, fields separated by [`DELIMITER`]. There is no quoting or
//! escaping and no header handling; every field is an opaque string.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::record::{RecordSet, Row};

/// Field separator for both reading and writing
pub const DELIMITER: char = ',';

/// Errors from reading a table
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },
}

/// Parse a stream of lines into a RecordSet
///
/// Trailing whitespace (including `\r\n`) is stripped from every line. A final
/// newline ends the input without adding an empty row; blank lines before the
/// end become a row with a single empty field.
pub fn parse<R: BufRead>(mut reader: R) -> Result<RecordSet, ParseError> {
    let mut rows = Vec::new();
    let mut buf = String::new();

    loop {
        buf.clear();
        let read = reader.read_line(&mut buf).map_err(|source| ParseError::Read {
            line: rows.len() + 1,
            source,
        })?;
        if read == 0 {
            break;
        }
        rows.push(split_line(&buf));
    }

    debug!(rows = rows.len(), "parse: done");
    Ok(RecordSet::new(rows))
}

/// Open and parse a file
pub fn parse_file(path: &Path) -> Result<RecordSet, ParseError> {
    debug!(path = %path.display(), "parse_file: called");
    let file = File::open(path).map_err(|source| ParseError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse(BufReader::new(file))
}

/// Write every row as one delimiter-joined, newline-terminated line
pub fn write_records<W: Write>(records: &RecordSet, mut writer: W) -> io::Result<()> {
    let mut sep = [0u8; 4];
    let sep: &str = DELIMITER.encode_utf8(&mut sep);
    for row in records {
        writeln!(writer, "{}", row.join(sep))?;
    }
    writer.flush()
}

fn split_line(line: &str) -> Row {
    line.trim_end().split(DELIMITER).map(str::to_string).collect::<Vec<_>>().into()
}
