//! Streaming CSV row parser.
//!
//! The `csv` reader is blocking, so it runs on tokio's blocking pool and hands
//! rows to the async side over a bounded channel. Consumers see a plain
//! [`Stream`] of [`RawRecord`]s in source order.
//!
//! A single UTF-8 byte-order mark at the start of the source is dropped by the
//! `csv` reader itself. Anything after it, including a second mark, is data.

use std::io::Read;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use csv::{ReaderBuilder, StringRecord};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{Result, SourceError};
use crate::record::RawRecord;

/// CSV parser producing a lazy stream of all-text records.
///
/// The first row is the header. Rows shorter than the header omit the missing
/// trailing columns; extra cells are keyed `_<index>`.
#[derive(Debug, Clone)]
pub struct RowParser {
    delimiter: u8,
    channel_capacity: usize,
}

impl Default for RowParser {
    fn default() -> Self {
        Self {
            delimiter: b',',
            channel_capacity: 256,
        }
    }
}

impl RowParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Number of parsed rows buffered ahead of the consumer.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Open a source file and start streaming its rows.
    ///
    /// Fails with [`SourceError::Open`] when the file cannot be opened.
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<RowStream> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SourceError::open(path, e))?;
        tracing::debug!(path = %path.display(), "streaming source rows");
        Ok(self.from_reader(file.into_std().await))
    }

    /// Stream rows from any blocking reader. Must be called inside a tokio
    /// runtime.
    pub fn from_reader<R>(&self, reader: R) -> RowStream
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let delimiter = self.delimiter;
        tokio::task::spawn_blocking(move || read_rows(reader, delimiter, &tx));
        RowStream {
            inner: ReceiverStream::new(rx),
        }
    }
}

fn read_rows<R: Read>(reader: R, delimiter: u8, tx: &mpsc::Sender<Result<RawRecord>>) {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = match csv_reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            let _ = tx.blocking_send(Err(e.into()));
            return;
        }
    };

    for row in csv_reader.records() {
        let item = row
            .map(|row| zip_row(&headers, &row))
            .map_err(SourceError::from);
        let failed = item.is_err();
        if tx.blocking_send(item).is_err() {
            tracing::debug!("row consumer dropped, stopping parser");
            return;
        }
        if failed {
            return;
        }
    }
}

fn zip_row(headers: &StringRecord, row: &StringRecord) -> RawRecord {
    row.iter()
        .enumerate()
        .map(|(idx, value)| {
            let column = headers
                .get(idx)
                .map_or_else(|| format!("_{idx}"), str::to_owned);
            (column, value.to_owned())
        })
        .collect()
}

/// Lazy, finite, non-restartable stream of source rows.
///
/// Ends after the first error.
pub struct RowStream {
    inner: ReceiverStream<Result<RawRecord>>,
}

impl RowStream {
    /// Drain the stream, stopping at the first error.
    pub async fn collect_all(mut self) -> Result<Vec<RawRecord>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }
}

impl Stream for RowStream {
    type Item = Result<RawRecord>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out one byte per call.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    async fn parse(bytes: &[u8]) -> Vec<RawRecord> {
        RowParser::new()
            .from_reader(Cursor::new(bytes.to_vec()))
            .collect_all()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn strips_exactly_one_leading_bom() {
        let rows = parse(b"\xEF\xBB\xBF\xEF\xBB\xBFname\nAna\n").await;
        let columns: Vec<_> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(columns, ["\u{FEFF}name"]);
        assert_eq!(rows[0]["\u{FEFF}name"], "Ana");
    }

    #[tokio::test]
    async fn strips_bom_split_across_reads() {
        let rows = RowParser::new()
            .from_reader(Trickle(Cursor::new(b"\xEF\xBB\xBFid,name\n7,Ana\n".to_vec())))
            .collect_all()
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], "7");
        assert_eq!(rows[0]["name"], "Ana");
    }

    #[tokio::test]
    async fn yields_rows_keyed_by_header_in_order() {
        let rows = parse(b"name,age,country\nAna,30,US\nBo,41,GB\n").await;
        assert_eq!(rows.len(), 2);
        let columns: Vec<_> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(columns, ["name", "age", "country"]);
        assert_eq!(rows[0]["name"], "Ana");
        assert_eq!(rows[1]["age"], "41");
    }

    #[tokio::test]
    async fn bom_and_plain_sources_parse_identically() {
        let plain = parse(b"name,phone\nAna,2025550123\n").await;
        let with_bom = parse(b"\xEF\xBB\xBFname,phone\nAna,2025550123\n").await;
        assert_eq!(plain, with_bom);
        assert!(with_bom[0].contains_key("name"));
    }

    #[tokio::test]
    async fn bom_like_bytes_inside_values_are_preserved() {
        let rows = parse("name\nx\u{FEFF}y\n".as_bytes()).await;
        assert_eq!(rows[0]["name"], "x\u{FEFF}y");
    }

    #[tokio::test]
    async fn handles_quotes_ragged_rows_and_blank_lines() {
        let rows = parse(b"name,note\n\"Doe, Jane\",\"said \"\"hi\"\"\"\n\nBo\nCy,x,extra\n").await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["name"], "Doe, Jane");
        assert_eq!(rows[0]["note"], "said \"hi\"");
        assert_eq!(rows[1].len(), 1);
        assert_eq!(rows[2]["_2"], "extra");
    }

    #[tokio::test]
    async fn custom_delimiter() {
        let rows = RowParser::new()
            .with_delimiter(b';')
            .with_channel_capacity(1)
            .from_reader(Cursor::new(b"a;b\n1;2\n3;4\n".to_vec()))
            .collect_all()
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["b"], "4");
    }

    #[tokio::test]
    async fn header_only_source_is_empty() {
        assert!(parse(b"name,phone\n").await.is_empty());
        assert!(parse(b"").await.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_read_error() {
        let result = RowParser::new()
            .from_reader(Cursor::new(b"name\n\xFF\xFE\n".to_vec()))
            .collect_all()
            .await;
        assert!(matches!(result, Err(SourceError::Read(_))));
    }

    #[tokio::test]
    async fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        let err = RowParser::new().open(&path).await.err().unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
        assert!(err.to_string().contains("accounts.csv"));
    }

    #[tokio::test]
    async fn opens_and_streams_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        std::fs::write(&path, "\u{FEFF}id,country\n1,US\n2,GB\n").unwrap();

        let mut stream = RowParser::new().open(&path).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first["id"], "1");
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second["country"], "GB");
        assert!(stream.next().await.is_none());
    }
}
