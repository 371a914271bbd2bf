//! Page range parsing

use crate::error::{Result, RipError};

/// Inclusive, 1-based page range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    first: u32,
    last: u32,
}

impl PageRange {
    pub fn new(first: u32, last: u32) -> Result<Self> {
        if first == 0 {
            return Err(RipError::InvalidInput("pages are numbered from 1".to_string()));
        }
        if first > last {
            return Err(RipError::InvalidInput(format!(
                "page range {}-{} is empty",
                first, last
            )));
        }
        Ok(Self { first, last })
    }

    /// `1..=count`
    pub fn first_n(count: u32) -> Result<Self> {
        Self::new(1, count)
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn last(&self) -> u32 {
        self.last
    }

    /// Number of pages covered (always at least one)
    pub fn page_count(&self) -> usize {
        (self.last - self.first) as usize + 1
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.first..=self.last
    }
}

/// What the user asked for on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSpec {
    /// Every page the pager metadata lists
    All,
    /// The first N pages
    Count(u32),
    Range(PageRange),
}

impl PageSpec {
    /// Resolve against the book's page count.
    ///
    /// A book whose metadata lists no pages is a metadata failure whatever
    /// was asked for.
    pub fn resolve(self, page_count: usize) -> Result<PageRange> {
        if page_count == 0 {
            return Err(RipError::MetadataFetch("pager lists no pages".to_string()));
        }

        match self {
            Self::All => {
                let count = u32::try_from(page_count).map_err(|_| {
                    RipError::InvalidInput(format!("page count {} is too large", page_count))
                })?;
                PageRange::first_n(count)
            }
            Self::Count(n) => PageRange::first_n(n),
            Self::Range(range) => Ok(range),
        }
    }
}

impl std::str::FromStr for PageSpec {
    type Err = RipError;

    /// Accepts `""` (all pages), `N` or `A-B`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::All);
        }

        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| RipError::InvalidInput(format!("pages - number not given: {:?}", s)))
        };

        match s.split_once('-') {
            Some((first, last)) => Ok(Self::Range(PageRange::new(parse(first)?, parse(last)?)?)),
            None => {
                let count = parse(s)?;
                PageRange::first_n(count)?;
                Ok(Self::Count(count))
            }
        }
    }
}
