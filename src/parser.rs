//! Listing page parsing
//!
//! Turns the raw bytes of a per-year listing page into [`PaperRecord`]s. The
//! archive changed its link layout in 2021, so which anchors count as papers
//! depends on the year ([`LinkRule`]). Parsing is pure: the same bytes always
//! give the same records, in document order.

use crate::types::PaperRecord;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Marker in pre-2021 abstract page links
pub const ABSTRACT_MARKER: &str = "Abstract.html";
/// Marker in 2021+ paper links
pub const HASH_MARKER: &str = "/hash/";
/// Replacement for [`ABSTRACT_MARKER`] in derived PDF links
pub const PDF_MARKER: &str = "paper.pdf";
/// Last year using the [`LinkRule::AbstractPage`] layout
pub const LAST_ABSTRACT_PAGE_YEAR: u16 = 2020;

#[allow(clippy::expect_used)]
static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static anchor selector is valid"));

/// Which anchors denote papers on a listing page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkRule {
    /// href contains `Abstract.html` (2020 and earlier)
    AbstractPage,
    /// href contains `/hash/` (2021 onwards)
    HashPath,
}

impl LinkRule {
    /// Rule in force for `year`
    pub fn for_year(year: u16) -> Self {
        if year <= LAST_ABSTRACT_PAGE_YEAR {
            LinkRule::AbstractPage
        } else {
            LinkRule::HashPath
        }
    }

    /// Whether an anchor with this href is a paper link
    pub fn matches(&self, href: &str) -> bool {
        match self {
            LinkRule::AbstractPage => href.contains(ABSTRACT_MARKER),
            LinkRule::HashPath => href.contains(HASH_MARKER),
        }
    }
}

/// Derive the PDF URL from an absolute abstract URL and the href it came from
///
/// `...-Abstract.html` becomes `...-paper.pdf`; any other link gets `.pdf`
/// appended.
pub fn derive_pdf_url(abstract_url: &str, href: &str) -> String {
    if href.contains(ABSTRACT_MARKER) {
        abstract_url.replace(ABSTRACT_MARKER, PDF_MARKER)
    } else {
        format!("{abstract_url}.pdf")
    }
}

/// Extracts paper records from listing pages of one archive
#[derive(Clone, Debug)]
pub struct ListingParser {
    origin: String,
    dedupe_links: bool,
}

impl ListingParser {
    /// Parser for an archive rooted at `origin` (no trailing slash needed)
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            dedupe_links: false,
        }
    }

    /// Keep only the first anchor per href
    pub fn dedupe_links(mut self, dedupe: bool) -> Self {
        self.dedupe_links = dedupe;
        self
    }

    /// Archive origin used to absolutize links
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Extract the paper records of `year` from a listing page
    ///
    /// Invalid UTF-8 is replaced rather than rejected; markup that yields no
    /// qualifying anchors gives an empty vector.
    pub fn extract_papers(&self, year: u16, page: &[u8]) -> Vec<PaperRecord> {
        let html = String::from_utf8_lossy(page);
        let document = Html::parse_document(&html);
        let rule = LinkRule::for_year(year);
        let mut seen = HashSet::new();

        document
            .select(&ANCHORS)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                if !rule.matches(href) {
                    return None;
                }
                if self.dedupe_links && !seen.insert(href.to_string()) {
                    return None;
                }

                let title = anchor.text().collect::<String>().trim().to_string();
                let abstract_url = format!("{}{}", self.origin, href);
                let pdf_url = derive_pdf_url(&abstract_url, href);
                Some(PaperRecord::new(year, title, abstract_url, pdf_url))
            })
            .collect()
    }

    /// First link ending in `.pdf` on a paper's abstract page, made absolute
    pub fn find_pdf_link(&self, page: &[u8]) -> Option<String> {
        let html = String::from_utf8_lossy(page);
        let document = Html::parse_document(&html);

        document
            .select(&ANCHORS)
            .filter_map(|anchor| anchor.value().attr("href"))
            .find(|href| href.ends_with(".pdf"))
            .map(|href| {
                if href.starts_with("http://") || href.starts_with("https://") {
                    href.to_string()
                } else {
                    format!("{}{}", self.origin, href)
                }
            })
    }
}
