//! HTML parser for catalog listing pages
//!
//! This module extracts dataset records from a listing page and, for the
//! discovery page, the total number of pages advertised by its pagination bar.

use crate::ParseError;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Organization recorded for datasets that carry no organization marker
pub const UNKNOWN_ORGANIZATION: &str = "Unknown";

/// One dataset entry of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub organization: String,
    pub description: String,
    pub resources: Vec<String>,
}

/// Extracts records and pagination data from a raw page body
pub trait PageParser: Send + Sync {
    /// Parses every dataset on the page, in document order
    ///
    /// A page either yields all of its records or an error; a missing
    /// required field fails the whole page.
    fn parse_records(&self, body: &str) -> Result<Vec<Record>, ParseError>;

    /// Reads the total page count from the discovery page
    ///
    /// Returns 1 when the page has no pagination markers.
    fn parse_page_count(&self, body: &str) -> u32;
}

/// Parser for the CKAN dataset listing markup used by catalog.data.gov
#[derive(Debug, Clone)]
pub struct CatalogParser {
    item: Selector,
    title: Selector,
    organization: Selector,
    description: Selector,
    resource: Selector,
    page_marker: Selector,
}

impl CatalogParser {
    /// Builds the parser, compiling all selectors up front
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            item: selector("ul.dataset-list > li.dataset-item")?,
            title: selector("h3.dataset-heading > a")?,
            organization: selector("span.organization-type[data-organization-type]")?,
            description: selector("div.notes")?,
            resource: selector("ul.dataset-resources > li a[href]")?,
            page_marker: selector("ul.pagination li.page-item")?,
        })
    }

    fn parse_item(&self, index: usize, item: ElementRef<'_>) -> Result<Record, ParseError> {
        let title = first_text(item, &self.title)
            .ok_or(ParseError::MissingField { index, field: "title" })?;

        let description = first_text(item, &self.description).ok_or(ParseError::MissingField {
            index,
            field: "description",
        })?;

        let organization = item
            .select(&self.organization)
            .next()
            .and_then(|el| el.value().attr("data-organization-type"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_ORGANIZATION)
            .to_string();

        let resources = item
            .select(&self.resource)
            .filter_map(|el| el.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Record {
            title,
            organization,
            description,
            resources,
        })
    }
}

impl PageParser for CatalogParser {
    fn parse_records(&self, body: &str) -> Result<Vec<Record>, ParseError> {
        let document = Html::parse_document(body);

        document
            .select(&self.item)
            .enumerate()
            .map(|(index, item)| self.parse_item(index, item))
            .collect()
    }

    fn parse_page_count(&self, body: &str) -> u32 {
        let document = Html::parse_document(body);

        // Non-numeric markers ("«", "»", "...") are skipped
        document
            .select(&self.page_marker)
            .filter_map(|el| el.text().collect::<String>().trim().parse::<u32>().ok())
            .max()
            .unwrap_or(1)
            .max(1)
    }
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Selector(css.to_string()))
}

/// Trimmed text of the first match, if it is non-empty
fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}
