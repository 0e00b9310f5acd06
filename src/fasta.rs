use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use needletail::errors::ParseErrorKind;
use needletail::{parse_fastx_file, parse_fastx_reader, FastxReader};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::types::SequenceRecord;

fn is_gz(path: &Path) -> bool {
    path.extension().map(|ext| ext == "gz").unwrap_or(false)
}

/// Open a text file (lineage CSV, hash list) for buffered reading,
/// decompressing if it ends in `.gz`.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gz(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Open `path` for writing, gzip-compressing if it ends in `.gz`.
pub fn create_writer(path: &Path) -> Result<Box<dyn Write>> {
    let f = File::create(path)?;
    let writer: Box<dyn Write> = if is_gz(path) {
        Box::new(BufWriter::new(GzEncoder::new(f, Compression::default())))
    } else {
        Box::new(BufWriter::new(f))
    };
    Ok(writer)
}

fn collect_records(mut reader: Box<dyn FastxReader>) -> Result<Vec<SequenceRecord>> {
    let mut records = Vec::new();
    while let Some(record) = reader.next() {
        let record = record?;
        let header = String::from_utf8_lossy(record.id());
        let seq = record.seq();
        records.push(SequenceRecord::new(&header, &String::from_utf8_lossy(&seq)));
    }
    Ok(records)
}

/// Read every record of a FASTA or FASTQ file. Format and compression are
/// detected from the content; an empty file gives no records.
pub fn read_sequence_records<P: AsRef<Path>>(path: P) -> Result<Vec<SequenceRecord>> {
    match parse_fastx_file(path.as_ref()) {
        Ok(reader) => collect_records(reader),
        Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Same as [`read_sequence_records`] over any byte source.
pub fn parse_sequences<R: Read + Send + 'static>(reader: R) -> Result<Vec<SequenceRecord>> {
    match parse_fastx_reader(reader) {
        Ok(reader) => collect_records(reader),
        Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

pub fn write_fasta_record<W: Write>(out: &mut W, name: &str, seq: &str) -> Result<()> {
    writeln!(out, ">{}\n{}", name, seq)?;
    Ok(())
}
