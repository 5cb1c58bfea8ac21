use std::time::Duration;

use thiserror::Error;

use crate::{
    configuration::ExtractionSettings,
    domain::{
        locator::{
            ElementSnapshot, Extractor, Field, FieldChain, CANDIDATE_LOCATORS, DETAIL_CHAINS,
            NAME_CHAIN, PLACE_LINK_MARKER,
        },
        BusinessRecord, ErrorKind, SocialProfiles, NOT_AVAILABLE,
    },
};

use super::{cancel, Cancelled, DriverError, PageDriver, RunContext};

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("No businesses found for '{query}'. Use simpler keywords or try nearby locations.")]
    NoResults { query: String },
    #[error("Found results but couldn't extract links. The results layout may have changed.")]
    NoLinks,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("No name: all locators failed")]
    MissingName,
    #[error("Stale element: {0}")]
    Stale(DriverError),
    #[error("Extraction failed: {0}")]
    Driver(DriverError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl From<DriverError> for RecordError {
    fn from(e: DriverError) -> Self {
        match e.is_stale() {
            true => RecordError::Stale(e),
            false => RecordError::Driver(e),
        }
    }
}

impl RecordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordError::MissingName => ErrorKind::NameExtract,
            RecordError::Stale(_) => ErrorKind::StaleElement,
            RecordError::Driver(_) => ErrorKind::ExtractError,
            RecordError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}

/// A result link selected for detail extraction. `index` is 1-based.
#[derive(Debug, Clone)]
pub struct CandidateRef<E> {
    pub index: usize,
    pub element: E,
    pub href: String,
}

/// Outcome of one field chain.
#[derive(Debug)]
pub enum FieldRead {
    Found(String),
    Missing,
    Failed(DriverError),
}

/// Collects up to `limit` place links, using the first link strategy that
/// matches anything.
pub async fn extract_candidates<D: PageDriver>(
    driver: &D,
    limit: usize,
    query: &str,
    ctx: &mut RunContext,
) -> Result<Vec<CandidateRef<D::Element>>, CandidateError> {
    let mut elements = vec![];
    for locator in CANDIDATE_LOCATORS {
        match driver.find_all(locator).await {
            Ok(found) if !found.is_empty() => {
                log::info!("Found {} result links with {}", found.len(), locator);
                elements = found;
                break;
            }
            Ok(_) => {}
            Err(e) => ctx.record(
                ErrorKind::ElementFind,
                "Error finding businesses",
                Some(e.to_string()),
            ),
        }
    }

    if elements.is_empty() {
        ctx.record(
            ErrorKind::NoResults,
            "No business elements",
            Some(format!("Query: {}", query)),
        );
        return Err(CandidateError::NoResults {
            query: query.to_string(),
        });
    }

    let mut candidates = vec![];
    for element in elements {
        if candidates.len() >= limit {
            break;
        }
        match driver.attr(&element, "href").await {
            Ok(Some(href)) if href.contains(PLACE_LINK_MARKER) => candidates.push(CandidateRef {
                index: candidates.len() + 1,
                element,
                href,
            }),
            Ok(_) => {}
            Err(e) => log::warn!("Skipping unreadable result link: {}", e),
        }
    }

    if candidates.is_empty() {
        ctx.record(
            ErrorKind::NoLinks,
            "Could not extract business links",
            Some("Elements stale".to_string()),
        );
        return Err(CandidateError::NoLinks);
    }

    Ok(candidates)
}

/// Opens the detail panel of `candidate` and reads every field from it.
pub async fn extract_fields<D: PageDriver>(
    driver: &D,
    candidate: &CandidateRef<D::Element>,
    keyword: &str,
    settings: &ExtractionSettings,
    ctx: &mut RunContext,
) -> Result<BusinessRecord, RecordError> {
    driver.scroll_into_view(&candidate.element).await?;
    cancel::sleep(&ctx.cancel, Duration::from_millis(settings.scroll_into_view_pause_ms)).await?;

    driver.activate(&candidate.element).await?;
    cancel::sleep(&ctx.cancel, settings.activation_settle.sample()).await?;

    let mut reads = Vec::with_capacity(DETAIL_CHAINS.len() + 1);
    for chain in std::iter::once(&NAME_CHAIN).chain(DETAIL_CHAINS) {
        reads.push((chain.field, read_field(driver, chain).await));
    }

    assemble_record(candidate.index, reads, keyword, ctx)
}

/// Walks a chain in order; the first non-empty value wins. A stale element
/// aborts the chain, other lookup errors fall through to the next strategy.
pub async fn read_field<D: PageDriver>(driver: &D, chain: &FieldChain) -> FieldRead {
    let mut last_error = None;

    for step in chain.steps {
        let elements = match driver.find_all(step.xpath).await {
            Ok(elements) => elements,
            Err(e) if e.is_stale() => return FieldRead::Failed(e),
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        };

        for element in elements {
            match snapshot(driver, &element, step.extractor).await {
                Ok(snap) => {
                    if let Some(value) = step.extractor.apply(&snap) {
                        return FieldRead::Found(value);
                    }
                }
                Err(e) if e.is_stale() => return FieldRead::Failed(e),
                Err(e) => last_error = Some(e),
            }
        }
    }

    match last_error {
        Some(e) => FieldRead::Failed(e),
        None => FieldRead::Missing,
    }
}

async fn snapshot<D: PageDriver>(
    driver: &D,
    element: &D::Element,
    extractor: Extractor,
) -> Result<ElementSnapshot, DriverError> {
    let text = match extractor.needs_text() {
        true => Some(driver.text(element).await?),
        false => None,
    };
    let mut attributes = Vec::with_capacity(extractor.attributes().len());
    for name in extractor.attributes() {
        attributes.push((*name, driver.attr(element, name).await?));
    }
    Ok(ElementSnapshot { text, attributes })
}

/// Turns per-field reads into a record. The name is mandatory; a stale
/// element anywhere discards the record; any other failed field becomes
/// "N/A" and is noted in the diagnostics.
pub fn assemble_record(
    index: usize,
    reads: Vec<(Field, FieldRead)>,
    keyword: &str,
    ctx: &mut RunContext,
) -> Result<BusinessRecord, RecordError> {
    let mut record = BusinessRecord {
        name: String::new(),
        phone: NOT_AVAILABLE.to_string(),
        address: NOT_AVAILABLE.to_string(),
        category: keyword.to_string(),
        website: NOT_AVAILABLE.to_string(),
        rating: NOT_AVAILABLE.to_string(),
        review_count: NOT_AVAILABLE.to_string(),
        emails: vec![],
        social_profiles: SocialProfiles::default(),
    };

    for (field, read) in reads {
        let value = match read {
            FieldRead::Found(value) => value,
            FieldRead::Failed(e) if e.is_stale() => return Err(RecordError::Stale(e)),
            FieldRead::Missing | FieldRead::Failed(_) if field == Field::Name => {
                return Err(RecordError::MissingName)
            }
            FieldRead::Missing => continue,
            FieldRead::Failed(e) => {
                ctx.record(
                    ErrorKind::FieldDegraded,
                    format!("Business #{}: {} unavailable", index, field.as_str()),
                    Some(e.to_string()),
                );
                continue;
            }
        };
        match field {
            Field::Name => record.name = value,
            Field::Phone => record.phone = value,
            Field::Address => record.address = value,
            Field::Website => record.website = value,
            Field::Category => record.category = value,
            Field::Rating => record.rating = value,
            Field::ReviewCount => record.review_count = value,
        }
    }

    if record.name.is_empty() {
        return Err(RecordError::MissingName);
    }
    Ok(record)
}
