//! JSON-lines fixture source.
//!
//! Each query kind is served from its own file holding one JSON object per
//! line, keyed by column name. The keys of the first record become the column
//! description; later records are projected onto it (absent keys read as
//! NULL, extra keys are ignored). An empty file reports the columns the
//! query template selects. Files are read lazily, `page_size` lines at
//! a time.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use crate::models::{
    query::{QueryKind, UsageQuery},
    row::{Row, RowValue},
};
use crate::providers::{RowPager, SourceError, WarehouseSource};

type Record = IndexMap<String, RowValue>;

/// A [`WarehouseSource`] reading JSON-lines files from disk.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    files: HashMap<QueryKind, PathBuf>,
    page_size: usize,
}

impl JsonlSource {
    pub fn new(page_size: usize) -> Self {
        Self {
            files: HashMap::new(),
            page_size: page_size.max(1),
        }
    }

    /// Serve results of `kind` from `path`.
    pub fn with_file(mut self, kind: QueryKind, path: impl Into<PathBuf>) -> Self {
        self.files.insert(kind, path.into());
        self
    }
}

#[async_trait]
impl WarehouseSource for JsonlSource {
    async fn open(&self, query: &UsageQuery) -> Result<Box<dyn RowPager>, SourceError> {
        let kind = query.kind();
        let path = self.files.get(&kind).ok_or(SourceError::UnknownQuery(kind))?;
        debug!(%kind, path = %path.display(), "opening fixture result");

        let file = File::open(path).await?;
        let mut pager = JsonlPager {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            columns: Vec::new(),
            pending: None,
            page_size: self.page_size,
        };

        // The first record fixes the column description; an empty export
        // reports the template's columns.
        match pager.next_record().await? {
            Some(first) => {
                pager.columns = first.keys().cloned().collect();
                pager.pending = Some(first);
            }
            None => pager.columns = kind.columns().iter().map(|c| c.to_string()).collect(),
        }
        Ok(Box::new(pager))
    }
}

struct JsonlPager {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    columns: Vec<String>,
    pending: Option<Record>,
    page_size: usize,
}

impl JsonlPager {
    async fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line).map_err(|source| SourceError::Decode {
                line: self.line_no,
                source,
            })?;
            return Ok(Some(record));
        }
        Ok(None)
    }

    fn project(&self, mut record: Record) -> Row {
        self.columns
            .iter()
            .map(|c| record.shift_remove(c).unwrap_or(RowValue::Null))
            .collect()
    }
}

#[async_trait]
impl RowPager for JsonlPager {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn fetch_page(&mut self) -> Result<Option<Vec<Row>>, SourceError> {
        let mut page = Vec::with_capacity(self.page_size);
        if let Some(first) = self.pending.take() {
            page.push(self.project(first));
        }
        while page.len() < self.page_size {
            match self.next_record().await? {
                Some(record) => page.push(self.project(record)),
                None => break,
            }
        }
        if page.is_empty() {
            Ok(None)
        } else {
            Ok(Some(page))
        }
    }
}
