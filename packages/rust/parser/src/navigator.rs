//! Locates the documentation content block and splits it into
//! heading/paragraphs/table segments.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use schemaharvest_shared::{HarvestError, NavigatorConfig, Result};

use crate::text::clean_text;

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// One closed heading/paragraphs/table group.
#[derive(Debug, Clone)]
pub struct Segment<'a> {
    /// Cleaned heading text.
    pub heading: String,
    /// Cleaned paragraph texts, in document order.
    pub paragraphs: Vec<String>,
    /// The table that closed the group. Always has a `thead`.
    pub table: ElementRef<'a>,
}

/// Group being accumulated until a table closes it.
struct PendingGroup {
    heading: String,
    paragraphs: Vec<String>,
}

/// Walks a parsed document along the configured anchor path.
#[derive(Debug)]
pub struct Navigator {
    config: NavigatorConfig,
    chain: Vec<Selector>,
    ignored_headings: Vec<String>,
}

impl Navigator {
    /// Compile the configured descendant chain. Invalid selectors are a config error.
    pub fn new(config: &NavigatorConfig) -> Result<Self> {
        let chain = config
            .descendant_chain
            .iter()
            .map(|s| {
                Selector::parse(s).map_err(|e| {
                    HarvestError::config(format!("invalid navigator selector {s:?}: {e:?}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let ignored_headings = config
            .ignored_headings
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        Ok(Self {
            config: config.clone(),
            chain,
            ignored_headings,
        })
    }

    /// Find the content element. Every step of the path must exist.
    pub fn locate<'a>(&self, doc: &'a Html) -> Result<ElementRef<'a>> {
        let anchor_id = self.config.anchor_id.as_str();
        let mut current = doc
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().id() == Some(anchor_id))
            .ok_or_else(|| {
                HarvestError::structure(format!("no element with id {anchor_id:?}"))
            })?;

        for (selector, source) in self.chain.iter().zip(&self.config.descendant_chain) {
            current = current.select(selector).next().ok_or_else(|| {
                HarvestError::structure(format!("no {source:?} below the content anchor"))
            })?;
        }

        let marker = self.config.block_class_marker.as_str();
        let block = current
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().attr("class").is_some_and(|c| c.contains(marker)))
            .ok_or_else(|| {
                HarvestError::structure(format!("no child block with class containing {marker:?}"))
            })?;

        let tag = self.config.content_tag.as_str();
        block
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == tag)
            .ok_or_else(|| HarvestError::structure(format!("content block has no <{tag}> child")))
    }

    /// Locate the content and split its direct children into segments.
    pub fn segment<'a>(&self, doc: &'a Html) -> Result<Vec<Segment<'a>>> {
        let content = self.locate(doc)?;
        let mut segments = Vec::new();
        let mut pending: Option<PendingGroup> = None;

        for child in content.children().filter_map(ElementRef::wrap) {
            let name = child.value().name();

            if HEADING_TAGS.contains(&name) {
                let heading = clean_text(child);
                if self.is_ignored_heading(&heading) {
                    debug!(%heading, "skipping non-dataset heading");
                    continue;
                }
                match pending.as_mut() {
                    Some(group) => group.heading = heading,
                    None => {
                        pending = Some(PendingGroup {
                            heading,
                            paragraphs: Vec::new(),
                        })
                    }
                }
            } else if name == "p" {
                if let Some(group) = pending.as_mut() {
                    group.paragraphs.push(clean_text(child));
                }
            } else if name == "table" {
                if !has_header(child) {
                    if let Some(group) = pending.take() {
                        warn!(heading = %group.heading, "ignoring table without a header section");
                    } else {
                        warn!("ignoring table without a header section");
                    }
                    continue;
                }
                if let Some(group) = pending.take() {
                    debug!(heading = %group.heading, "closed segment");
                    segments.push(Segment {
                        heading: group.heading,
                        paragraphs: group.paragraphs,
                        table: child,
                    });
                }
            }
        }

        Ok(segments)
    }

    fn is_ignored_heading(&self, heading: &str) -> bool {
        let heading = heading.to_lowercase();
        self.ignored_headings.iter().any(|h| *h == heading)
    }
}

/// Whether a table element has a `thead` section.
pub fn has_header(table: ElementRef<'_>) -> bool {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "thead")
}
