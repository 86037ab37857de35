//! CSV input and output plumbing shared by the store and the CLI.
//!
//! An [`InputFormat`] pins down how an upload is read: the delimiter comes
//! from the file extension (`.tsv` is tab-separated, anything else
//! comma-separated) unless overridden, and the encoding label is resolved
//! through `encoding_rs`. A [`CsvSource`] then yields the header row and each
//! data row as decoded text; typing the cells is left to the store. The path
//! `-` stands for stdin on input and stdout on output.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputFormat {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for InputFormat {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        }
    }
}

impl InputFormat {
    pub fn for_path(
        path: &Path,
        delimiter: Option<u8>,
        encoding_label: Option<&str>,
    ) -> Result<Self> {
        let encoding = match encoding_label {
            Some(label) => Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| anyhow!("Unknown encoding '{label}'"))?,
            None => UTF_8,
        };
        let is_tsv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));
        let delimiter = delimiter.unwrap_or(if is_tsv {
            DEFAULT_TSV_DELIMITER
        } else {
            DEFAULT_CSV_DELIMITER
        });
        Ok(Self {
            delimiter,
            encoding,
        })
    }
}

fn is_stdio(path: &Path) -> bool {
    path == Path::new("-")
}

/// Header-first CSV reader that hands out rows as decoded strings.
pub struct CsvSource<R> {
    reader: csv::Reader<R>,
    encoding: &'static Encoding,
    record: csv::ByteRecord,
    rows_read: usize,
}

impl CsvSource<Box<dyn Read>> {
    pub fn open(path: &Path, format: InputFormat) -> Result<Self> {
        let input: Box<dyn Read> = if is_stdio(path) {
            Box::new(std::io::stdin().lock())
        } else {
            Box::new(BufReader::new(
                File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
            ))
        };
        Ok(Self::new(input, format))
    }
}

impl<R: Read> CsvSource<R> {
    pub fn new(input: R, format: InputFormat) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(format.delimiter)
            .double_quote(true)
            .flexible(true)
            .from_reader(input);
        Self {
            reader,
            encoding: format.encoding,
            record: csv::ByteRecord::new(),
            rows_read: 0,
        }
    }

    pub fn headers(&mut self) -> Result<Vec<String>> {
        let headers = self.reader.byte_headers().context("Reading header row")?;
        decode_fields(headers, self.encoding).context("Decoding header row")
    }

    /// Next data row, or `None` once the input is exhausted. Row numbers in
    /// errors count the header as row 1.
    pub fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        let row_number = self.rows_read + 2;
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .with_context(|| format!("Reading row {row_number}"))?;
        if !more {
            return Ok(None);
        }
        self.rows_read += 1;
        decode_fields(&self.record, self.encoding)
            .with_context(|| format!("Decoding row {row_number}"))
            .map(Some)
    }
}

fn decode_fields(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| {
            let (text, _, had_errors) = encoding.decode(field);
            if had_errors {
                bail!("Invalid {} text in field", encoding.name());
            }
            Ok(text.into_owned())
        })
        .collect()
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_stdio(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn tsv_extension_selects_tab_delimiter() {
        let tsv = InputFormat::for_path(Path::new("data.TSV"), None, None).unwrap();
        assert_eq!(tsv.delimiter, DEFAULT_TSV_DELIMITER);
        let csv = InputFormat::for_path(Path::new("data.csv"), None, None).unwrap();
        assert_eq!(csv, InputFormat::default());
        let overridden = InputFormat::for_path(Path::new("data.tsv"), Some(b';'), None).unwrap();
        assert_eq!(overridden.delimiter, b';');
    }

    #[test]
    fn encoding_labels_resolve_or_fail() {
        let format = InputFormat::for_path(Path::new("-"), None, Some(" latin1 ")).unwrap();
        assert_eq!(format.encoding, WINDOWS_1252);
        assert!(InputFormat::for_path(Path::new("-"), None, Some("klingon")).is_err());
    }

    #[test]
    fn source_decodes_rows_in_the_input_encoding() {
        let bytes: &[u8] = b"city;temp\nK\xf6ln;12\n";
        let format = InputFormat {
            delimiter: b';',
            encoding: WINDOWS_1252,
        };
        let mut source = CsvSource::new(bytes, format);
        assert_eq!(source.headers().unwrap(), vec!["city", "temp"]);
        assert_eq!(source.next_row().unwrap(), Some(vec!["Köln".to_string(), "12".to_string()]));
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn invalid_bytes_report_the_row() {
        let bytes: &[u8] = b"a\nok\n\xff\n";
        let mut source = CsvSource::new(bytes, InputFormat::default());
        source.headers().unwrap();
        assert!(source.next_row().unwrap().is_some());
        let err = source.next_row().unwrap_err();
        assert!(format!("{err:#}").contains("Decoding row 3"));
    }
}
