//! Resumable ingestion passes.
//!
//! Each pass resolves the identifiers still lacking a completion marker for its
//! kind and fetches them one at a time. Items are independent: a run that dies
//! after item k leaves items 1..=k recorded and the rest pending.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::blurb::{BlurbSource, extract_blurb};
use crate::domain::{FetchKind, InsertOutcome, Isbn, MarcField, MarcFlag};
use crate::error::HarvestError;
use crate::marc::{MarcSource, parse_marc_xml};
use crate::resolver;
use crate::store::CatalogStore;

#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    /// Resolve and report pending work without fetching.
    pub dry_run: bool,
    /// Process at most this many items per pass.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    MarcFound { fields: usize },
    MarcEmpty,
    BlurbStored,
    /// A completion marker was already present; nothing new was recorded.
    AlreadyRecorded,
    /// Nothing was recorded, so the next run retries the item.
    StillPending { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Marc21 { isbn: Isbn },
    /// `link` is the deposit page taken from a stored 856 field.
    Blurb { isbn: Isbn, link: String },
}

impl WorkItem {
    pub fn isbn(&self) -> &Isbn {
        match self {
            WorkItem::Marc21 { isbn } | WorkItem::Blurb { isbn, .. } => isbn,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub kind: FetchKind,
    pub position: usize,
    pub total: usize,
    pub isbn: Option<Isbn>,
    pub outcome: Option<ItemOutcome>,
}

/// Called once with `position == 0` before a pass and once after every item.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub kind: FetchKind,
    pub dry_run: bool,
    pub pending: usize,
    pub processed: usize,
    pub marc_found: usize,
    pub marc_empty: usize,
    pub blurbs_stored: usize,
    pub already_recorded: usize,
    pub still_pending: Vec<Isbn>,
    pub started_at: String,
    pub finished_at: String,
}

impl PassReport {
    fn new(kind: FetchKind, pending: usize, dry_run: bool) -> Self {
        Self {
            kind,
            dry_run,
            pending,
            processed: 0,
            marc_found: 0,
            marc_empty: 0,
            blurbs_stored: 0,
            already_recorded: 0,
            still_pending: Vec::new(),
            started_at: iso_timestamp(),
            finished_at: String::new(),
        }
    }

    fn record(&mut self, isbn: &Isbn, outcome: &ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::MarcFound { .. } => self.marc_found += 1,
            ItemOutcome::MarcEmpty => self.marc_empty += 1,
            ItemOutcome::BlurbStored => self.blurbs_stored += 1,
            ItemOutcome::AlreadyRecorded => self.already_recorded += 1,
            ItemOutcome::StillPending { .. } => self.still_pending.push(isbn.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub passes: Vec<PassReport>,
}

pub struct Harvester<M: MarcSource, B: BlurbSource> {
    store: CatalogStore,
    marc: M,
    blurb: B,
    link_pattern: Regex,
}

impl<M: MarcSource, B: BlurbSource> Harvester<M, B> {
    pub fn new(store: CatalogStore, marc: M, blurb: B, link_pattern: Regex) -> Self {
        Self {
            store,
            marc,
            blurb,
            link_pattern,
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn into_store(self) -> CatalogStore {
        self.store
    }

    /// Runs the requested passes in the order given. Blurb links come from
    /// stored 856 fields, so metadata should precede blurbs.
    pub fn run(
        &mut self,
        kinds: &[FetchKind],
        options: &HarvestOptions,
        sink: &dyn ProgressSink,
    ) -> Result<HarvestReport, HarvestError> {
        let mut passes = Vec::with_capacity(kinds.len());
        for kind in kinds {
            passes.push(self.run_pass(*kind, options, sink)?);
        }
        Ok(HarvestReport { passes })
    }

    pub fn pending(&self, kind: FetchKind) -> Result<Vec<WorkItem>, HarvestError> {
        let completed = self.store.completed_isbns(kind)?;
        match kind {
            FetchKind::Marc21 => {
                let all = self.store.all_isbns()?;
                Ok(resolver::pending(all, completed)
                    .into_iter()
                    .map(|isbn| WorkItem::Marc21 { isbn })
                    .collect())
            }
            FetchKind::Blurb => {
                let mut links = self
                    .store
                    .blurb_links(&self.link_pattern)?
                    .into_iter()
                    .collect::<HashMap<_, _>>();
                let candidates = links.keys().cloned().collect::<Vec<_>>();
                Ok(resolver::pending(candidates, completed)
                    .into_iter()
                    .filter_map(|isbn| {
                        let link = links.remove(&isbn)?;
                        Some(WorkItem::Blurb { isbn, link })
                    })
                    .collect())
            }
        }
    }

    pub fn run_pass(
        &mut self,
        kind: FetchKind,
        options: &HarvestOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PassReport, HarvestError> {
        let mut work = self.pending(kind)?;
        let pending = work.len();
        if let Some(limit) = options.limit {
            work.truncate(limit);
        }
        tracing::info!(%kind, pending, selected = work.len(), "resolved work set");

        let mut report = PassReport::new(kind, pending, options.dry_run);
        if options.dry_run {
            report.finished_at = iso_timestamp();
            return Ok(report);
        }

        let total = work.len();
        sink.event(ProgressEvent {
            kind,
            position: 0,
            total,
            isbn: None,
            outcome: None,
        });

        for (index, item) in work.into_iter().enumerate() {
            let outcome = match &item {
                WorkItem::Marc21 { isbn } => fetch_marc(&mut self.store, &self.marc, isbn)?,
                WorkItem::Blurb { isbn, link } => {
                    fetch_blurb(&self.store, &self.blurb, isbn, link)?
                }
            };
            report.record(item.isbn(), &outcome);
            sink.event(ProgressEvent {
                kind,
                position: index + 1,
                total,
                isbn: Some(item.isbn().clone()),
                outcome: Some(outcome),
            });
        }

        report.finished_at = iso_timestamp();
        tracing::info!(
            %kind,
            processed = report.processed,
            still_pending = report.still_pending.len(),
            "pass finished"
        );
        Ok(report)
    }
}

/// One metadata fetch for `isbn`.
///
/// A non-success status leaves the store untouched. A record without
/// datafields gets a negative marker so it is never requested again. Field
/// rows and the positive marker are both attempted on every call, so a run
/// interrupted between the two writes is completed by the next one.
pub fn fetch_marc<M: MarcSource + ?Sized>(
    store: &mut CatalogStore,
    source: &M,
    isbn: &Isbn,
) -> Result<ItemOutcome, HarvestError> {
    let body = match source.fetch_record(isbn) {
        Ok(body) => body,
        Err(HarvestError::MarcStatus { status, .. }) => {
            tracing::warn!(%isbn, status, "SRU request failed; item stays pending");
            return Ok(ItemOutcome::StillPending {
                reason: format!("HTTP {status}"),
            });
        }
        Err(err) => return Err(err),
    };

    let fields = dedup_fields(parse_marc_xml(isbn, &body)?);
    if fields.is_empty() {
        return Ok(match store.mark_marc_downloaded(isbn, MarcFlag::Empty)? {
            InsertOutcome::Inserted => {
                tracing::debug!(%isbn, "no MARC21 datafields");
                ItemOutcome::MarcEmpty
            }
            InsertOutcome::AlreadyExists => {
                tracing::warn!(%isbn, "already recorded in Downloaded");
                ItemOutcome::AlreadyRecorded
            }
        });
    }

    if store.insert_marc_fields(&fields)? == InsertOutcome::AlreadyExists {
        tracing::warn!(%isbn, "MARC21 fields already recorded");
    }
    Ok(match store.mark_marc_downloaded(isbn, MarcFlag::Found)? {
        InsertOutcome::Inserted => ItemOutcome::MarcFound {
            fields: fields.len(),
        },
        InsertOutcome::AlreadyExists => {
            tracing::warn!(%isbn, "already recorded in Downloaded");
            ItemOutcome::AlreadyRecorded
        }
    })
}

/// One blurb fetch for `isbn` from `link`. Failures are not marked, so the
/// item is retried on the next run.
pub fn fetch_blurb<B: BlurbSource + ?Sized>(
    store: &CatalogStore,
    source: &B,
    isbn: &Isbn,
    link: &str,
) -> Result<ItemOutcome, HarvestError> {
    let html = match source.fetch_page(isbn, link) {
        Ok(html) => html,
        Err(HarvestError::BlurbStatus { status, .. }) => {
            tracing::warn!(%isbn, status, link, "blurb request failed; item stays pending");
            return Ok(ItemOutcome::StillPending {
                reason: format!("HTTP {status}"),
            });
        }
        Err(err) => return Err(err),
    };

    let Some(text) = extract_blurb(&html) else {
        tracing::warn!(%isbn, link, "blurb page has no paragraph text");
        return Ok(ItemOutcome::StillPending {
            reason: "no paragraph".to_string(),
        });
    };

    Ok(match store.insert_blurb(isbn, &text, link)? {
        InsertOutcome::Inserted => ItemOutcome::BlurbStored,
        InsertOutcome::AlreadyExists => {
            tracing::warn!(%isbn, "already recorded in Blurbs");
            ItemOutcome::AlreadyRecorded
        }
    })
}

/// Drops exact duplicates, keeping first occurrences in order.
pub fn dedup_fields(fields: Vec<MarcField>) -> Vec<MarcField> {
    let mut seen = HashSet::with_capacity(fields.len());
    fields
        .into_iter()
        .filter(|field| seen.insert(field.clone()))
        .collect()
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
