//! Page-range expressions for split and import
//!
//! User-facing ranges are 1-based: `"1-7,12,14-18"`. The same canonical
//! string is what the engine's import call consumes, so a parsed
//! [`PageRange`] is passed to the engine through its `Display` form.
//!
//! Grammar:
//!
//! ```text
//! range    := subrange (',' subrange)*
//! subrange := number | number '-' number
//! number   := [0-9]+            (greater than zero)
//! ```
//!
//! Whitespace around numbers and separators is ignored. A sub-range holds
//! at most one `-`, and its lower bound must not exceed its upper bound.

use crate::error::{PdfError, Result};
use std::fmt;
use std::str::FromStr;

/// One inclusive, 1-based run of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubRange {
    from: u32,
    to: u32,
}

impl SubRange {
    pub fn new(from: u32, to: u32) -> Result<Self> {
        let text = || format!("{}-{}", from, to);
        if from == 0 || to == 0 {
            return Err(range_error(text(), "page number must be greater than 0"));
        }
        if from > to {
            return Err(range_error(
                text(),
                "lower bound can't be more than upper bound",
            ));
        }
        Ok(Self { from, to })
    }

    pub fn single(page: u32) -> Result<Self> {
        Self::new(page, page)
    }

    pub fn start(&self) -> u32 {
        self.from
    }

    pub fn end(&self) -> u32 {
        self.to
    }

    pub fn len(&self) -> usize {
        (self.to - self.from) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.from..=self.to
    }
}

impl fmt::Display for SubRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

/// Ordered list of validated sub-ranges.
///
/// # Example
///
/// ```
/// use pdfium_gate::PageRange;
///
/// let range: PageRange = " 1 - 7, 12 ,14-18".parse()?;
/// assert_eq!(range.to_string(), "1-7,12,14-18");
/// assert_eq!(range.page_count(), 13);
/// assert!("1,,3".parse::<PageRange>().is_err());
/// # Ok::<(), pdfium_gate::PdfError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRange {
    sub_ranges: Vec<SubRange>,
}

impl PageRange {
    pub fn parse(expression: &str) -> Result<Self> {
        if expression.trim().is_empty() {
            return Err(range_error(expression, "page range can't be empty"));
        }

        let sub_ranges = expression
            .split(',')
            .map(parse_sub_range)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { sub_ranges })
    }

    pub fn from_sub_ranges(sub_ranges: Vec<SubRange>) -> Result<Self> {
        if sub_ranges.is_empty() {
            return Err(range_error("", "page range can't be empty"));
        }
        Ok(Self { sub_ranges })
    }

    /// Every page of a document with `page_count` pages.
    pub fn all(page_count: u32) -> Result<Self> {
        Self::from_sub_ranges(vec![SubRange::new(1, page_count)?])
    }

    pub fn sub_ranges(&self) -> &[SubRange] {
        &self.sub_ranges
    }

    /// Number of pages selected, counting repeats.
    pub fn page_count(&self) -> usize {
        self.sub_ranges.iter().map(SubRange::len).sum()
    }

    /// Selected 1-based page numbers in order.
    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.sub_ranges.iter().flat_map(SubRange::pages)
    }

    /// Highest page number referenced.
    pub fn max_page(&self) -> u32 {
        self.sub_ranges.iter().map(|r| r.to).max().unwrap_or(0)
    }

    /// Canonical string handed to the engine's import call.
    pub fn to_engine_string(&self) -> String {
        self.to_string()
    }
}

impl FromStr for PageRange {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        PageRange::parse(s)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sub) in self.sub_ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", sub)?;
        }
        Ok(())
    }
}

/// Inclusive, 0-based page index pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndexRange {
    from: u32,
    to: u32,
}

impl PageIndexRange {
    pub fn new(from_index: i32, to_index: i32) -> Result<Self> {
        if from_index < 0 {
            return Err(PdfError::invalid(
                "from_index",
                "value can't be less than zero",
            ));
        }
        if to_index < 0 {
            return Err(PdfError::invalid("to_index", "value can't be less than zero"));
        }
        if from_index > to_index {
            return Err(PdfError::invalid(
                "from_index",
                "from_index can't be more than to_index",
            ));
        }
        Ok(Self {
            from: from_index as u32,
            to: to_index as u32,
        })
    }

    pub fn from_index(&self) -> u32 {
        self.from
    }

    pub fn to_index(&self) -> u32 {
        self.to
    }

    /// Same pages as a 1-based range.
    pub fn to_page_range(&self) -> PageRange {
        PageRange {
            sub_ranges: vec![SubRange {
                from: self.from + 1,
                to: self.to + 1,
            }],
        }
    }
}

fn parse_sub_range(raw: &str) -> Result<SubRange> {
    let sub_range = raw.trim();
    if sub_range.is_empty() {
        return Err(range_error(raw, "sub-range can't be empty"));
    }

    let bounds: Vec<&str> = sub_range.split('-').collect();
    match bounds.as_slice() {
        [page] => {
            let page = parse_number(page, sub_range)?;
            Ok(SubRange { from: page, to: page })
        }
        [from, to] => {
            let from = parse_number(from, sub_range)?;
            let to = parse_number(to, sub_range)?;
            if from > to {
                return Err(range_error(
                    sub_range,
                    "lower bound can't be more than upper bound",
                ));
            }
            Ok(SubRange { from, to })
        }
        _ => Err(range_error(
            sub_range,
            "sub-range must contain only one lower and upper bound",
        )),
    }
}

fn parse_number(raw: &str, sub_range: &str) -> Result<u32> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(range_error(sub_range, format!("[{}] is not a number", digits)));
    }
    let number: u32 = digits
        .parse()
        .map_err(|_| range_error(sub_range, format!("[{}] is not a number", digits)))?;
    if number == 0 {
        return Err(range_error(sub_range, "page number must be greater than 0"));
    }
    Ok(number)
}

fn range_error(sub_range: impl Into<String>, reason: impl Into<String>) -> PdfError {
    PdfError::PageRangeFormat {
        sub_range: sub_range.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ranges() {
        let cases = [
            ("1", "1", 1),
            ("1-7,12,14-18", "1-7,12,14-18", 13),
            (" 1 - 7 , 12 ", "1-7,12", 8),
            ("3-3", "3", 1),
            ("5,1,5", "5,1,5", 3),
            ("10-12,2", "10-12,2", 4),
        ];
        for (input, canonical, count) in cases {
            let range = PageRange::parse(input)
                .unwrap_or_else(|e| panic!("{:?} should parse: {}", input, e));
            assert_eq!(range.to_engine_string(), canonical, "input {:?}", input);
            assert_eq!(range.page_count(), count, "input {:?}", input);
        }
    }

    #[test]
    fn test_invalid_ranges() {
        let cases = [
            "",
            ",,",
            " ,, ",
            "1,",
            "1,,,",
            "1, ,",
            "1,-",
            "1,2 -",
            "1,2-abcd",
            "1,3-d7",
            "1d, 7-9",
            "1, 2 5-27 ,29",
            "1 3",
            "-1",
            "2-2- 2",
            " 2-3-7",
            "2-5 - 14- 18",
            "0-1",
            "1-5,0",
            "0,0,0",
            "+3",
            "5-3",
            "99999999999",
        ];
        for input in cases {
            match PageRange::parse(input) {
                Err(PdfError::PageRangeFormat { .. }) => {}
                other => panic!("{:?} should be rejected, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_error_names_sub_range() {
        match PageRange::parse("1,3-d7,9") {
            Err(PdfError::PageRangeFormat { sub_range, reason }) => {
                assert_eq!(sub_range, "3-d7");
                assert_eq!(reason, "[d7] is not a number");
            }
            other => panic!("unexpected {:?}", other),
        }
        match PageRange::parse("1,2-2-2") {
            Err(PdfError::PageRangeFormat { sub_range, .. }) => assert_eq!(sub_range, "2-2-2"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pages_in_order() {
        let range = PageRange::parse("1-7,12,14-18").unwrap();
        let pages: Vec<u32> = range.pages().collect();
        assert_eq!(pages, vec![1, 2, 3, 4, 5, 6, 7, 12, 14, 15, 16, 17, 18]);
        assert_eq!(range.max_page(), 18);
    }

    #[test]
    fn test_index_range_is_zero_based() {
        let range = PageIndexRange::new(0, 3).unwrap().to_page_range();
        assert_eq!(range.to_engine_string(), "1-4");
        assert_eq!(
            PageIndexRange::new(5, 5).unwrap().to_page_range().to_string(),
            "6"
        );

        assert!(matches!(
            PageIndexRange::new(-1, 3),
            Err(PdfError::InvalidArgument { name: "from_index", .. })
        ));
        assert!(matches!(
            PageIndexRange::new(0, -3),
            Err(PdfError::InvalidArgument { name: "to_index", .. })
        ));
        assert!(matches!(
            PageIndexRange::new(4, 3),
            Err(PdfError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_sub_range_constructors() {
        assert_eq!(SubRange::new(2, 4).unwrap().len(), 3);
        assert!(SubRange::new(0, 4).is_err());
        assert!(SubRange::new(4, 2).is_err());
        assert_eq!(PageRange::all(19).unwrap().to_string(), "1-19");
        assert!(PageRange::all(0).is_err());
    }
}
