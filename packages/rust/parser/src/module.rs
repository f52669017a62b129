//! Module document parser: one documentation page in, raw datasets out.

use scraper::Html;
use tracing::{debug, instrument};

use schemaharvest_shared::{HarvestError, NavigatorConfig, Result};

use crate::navigator::Navigator;
use crate::table::{ColumnRecord, parse_column_table};

/// Untyped dataset fields from one heading/table segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDataset {
    /// Cleaned heading text; becomes the dataset's `module_name`.
    pub heading: String,
    /// Cleaned paragraph texts, boilerplate included.
    pub paragraphs: Vec<String>,
    pub columns: Vec<ColumnRecord>,
}

/// Parses module documents with a fixed navigator configuration.
#[derive(Debug)]
pub struct ModuleParser {
    navigator: Navigator,
}

impl ModuleParser {
    pub fn new(config: &NavigatorConfig) -> Result<Self> {
        Ok(Self {
            navigator: Navigator::new(config)?,
        })
    }

    /// Parse a module document into datasets keyed by heading, in page order.
    ///
    /// A heading that appears twice keeps its first position and takes the
    /// later segment's fields.
    #[instrument(skip_all, fields(bytes = html.len()))]
    pub fn parse(&self, html: &str) -> Result<Vec<RawDataset>> {
        let doc = Html::parse_document(html);
        let segments = self.navigator.segment(&doc)?;

        let mut datasets: Vec<RawDataset> = Vec::with_capacity(segments.len());

        for segment in segments {
            let columns = parse_column_table(segment.table)
                .map_err(|e| HarvestError::in_dataset(&segment.heading, e))?;

            debug!(heading = %segment.heading, columns = columns.len(), "parsed dataset");

            let raw = RawDataset {
                heading: segment.heading,
                paragraphs: segment.paragraphs,
                columns,
            };

            match datasets.iter_mut().find(|d| d.heading == raw.heading) {
                Some(existing) => *existing = raw,
                None => datasets.push(raw),
            }
        }

        Ok(datasets)
    }
}
