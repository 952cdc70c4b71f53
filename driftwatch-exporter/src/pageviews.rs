// Driftwatch Exporter - Wikimedia pageview dumps
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reading Wikimedia hourly pageview dumps.
//!
//! Each dump line is `project page views bytes`, e.g.
//! `en.wikipedia Main_Page 242332 0`. A dump covers one hour, named
//! `pageviews-YYYYMMDD-HH0000.gz`. Projects become metric keys and pages
//! become categories.

use chrono::{NaiveDate, TimeZone, Utc};
use driftwatch::Observation;
use flate2::read::MultiGzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Base of the public dump tree.
pub const DUMP_BASE_URL: &str = "https://dumps.wikimedia.org/other/pageviews";

/// Category that absorbs pages beyond `--top-pages`.
pub const OTHER_CATEGORY: &str = "__other__";

/// Dump parsing errors.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hour {0} is outside 0-23")]
    InvalidHour(u32),

    #[error("Cannot derive dump hour from file name: {0}")]
    UnknownTimestamp(String),
}

/// One parsed dump line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageviewRecord {
    pub project: String,
    pub page: String,
    pub views: u64,
    pub bytes: u64,
}

/// Observations read from one dump plus line accounting.
#[derive(Debug, Clone, Default)]
pub struct DumpBatch {
    pub timestamp_ms: u64,
    pub observations: Vec<Observation>,
    pub lines: u64,
    pub skipped: u64,
}

/// URL of the dump for `hour` UTC on `date`.
pub fn dump_url(date: NaiveDate, hour: u32) -> Result<String, ParseError> {
    if hour > 23 {
        return Err(ParseError::InvalidHour(hour));
    }
    Ok(format!(
        "{}/{}/{}/pageviews-{}-{:02}0000.gz",
        DUMP_BASE_URL,
        date.format("%Y"),
        date.format("%Y-%m"),
        date.format("%Y%m%d"),
        hour
    ))
}

/// Event time (ms since epoch) of the dump for `hour` UTC on `date`.
pub fn dump_timestamp_ms(date: NaiveDate, hour: u32) -> Result<u64, ParseError> {
    let start = date
        .and_hms_opt(hour, 0, 0)
        .ok_or(ParseError::InvalidHour(hour))?;
    Ok(Utc.from_utc_datetime(&start).timestamp_millis().max(0) as u64)
}

/// Event time encoded in a dump file name (`pageviews-YYYYMMDD-HH0000[.gz]`).
pub fn timestamp_from_filename(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix("pageviews-")?;
    let (day, time) = rest.split_once('-')?;
    let date = NaiveDate::parse_from_str(day, "%Y%m%d").ok()?;
    let hour: u32 = time.get(0..2)?.parse().ok()?;
    dump_timestamp_ms(date, hour).ok()
}

/// Parse one dump line. Lines with fewer than four fields or a
/// non-integer view count yield `None`.
pub fn parse_line(line: &str) -> Option<PageviewRecord> {
    let mut fields = line.split_whitespace();
    let project = fields.next()?;
    let page = fields.next()?;
    let views = fields.next()?.parse::<u64>().ok()?;
    let bytes = fields.next()?.parse::<u64>().unwrap_or(0);
    Some(PageviewRecord {
        project: project.to_string(),
        page: page.to_string(),
        views,
        bytes,
    })
}

/// Read a dump from `reader`, stamping every observation with `timestamp_ms`.
///
/// Repeated `(project, page)` pairs are summed. Invalid UTF-8 in a line is
/// replaced rather than rejected. With `top_pages = Some(n)`
/// only the `n` most viewed pages per project keep their own category;
/// the rest are folded into [`OTHER_CATEGORY`].
pub fn read_dump<R: Read>(
    reader: R,
    timestamp_ms: u64,
    top_pages: Option<usize>,
) -> Result<DumpBatch, ParseError> {
    let mut per_project: HashMap<String, HashMap<String, u64>> = HashMap::new();
    let mut batch = DumpBatch {
        timestamp_ms,
        ..DumpBatch::default()
    };

    // Page titles are not guaranteed to be valid UTF-8.
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        batch.lines += 1;
        let line = String::from_utf8_lossy(&buf);
        match parse_line(&line) {
            Some(record) if record.views > 0 => {
                *per_project
                    .entry(record.project)
                    .or_default()
                    .entry(record.page)
                    .or_insert(0) += record.views;
            }
            Some(_) => {}
            None => batch.skipped += 1,
        }
    }

    let mut projects: Vec<_> = per_project.into_iter().collect();
    projects.sort_by(|a, b| a.0.cmp(&b.0));
    for (project, pages) in projects {
        for (page, views) in fold_pages(pages, top_pages) {
            batch
                .observations
                .push(Observation::new(project.as_str(), page, timestamp_ms, views));
        }
    }
    Ok(batch)
}

/// Open a dump file, decompressing `.gz` files.
pub fn read_dump_file(
    path: &Path,
    timestamp_ms: u64,
    top_pages: Option<usize>,
) -> Result<DumpBatch, ParseError> {
    let file = File::open(path)?;
    let gzipped = path.extension().is_some_and(|ext| ext == "gz");
    if gzipped {
        read_dump(MultiGzDecoder::new(file), timestamp_ms, top_pages)
    } else {
        read_dump(file, timestamp_ms, top_pages)
    }
}

/// Pages sorted by name, with the tail beyond `top_pages` folded together.
fn fold_pages(pages: HashMap<String, u64>, top_pages: Option<usize>) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = pages.into_iter().collect();
    if let Some(limit) = top_pages {
        if ranked.len() > limit {
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let other: u64 = ranked[limit..].iter().map(|(_, v)| v).sum();
            ranked.truncate(limit);
            if other > 0 {
                ranked.push((OTHER_CATEGORY.to_string(), other));
            }
        }
    }
    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked
}
