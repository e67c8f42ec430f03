//! Character sets
//!
//! A [`CharSet`] is a normalized list of inclusive code point ranges. It
//! supports membership testing, complement, union, conversion to a regex
//! character class, and parsing from the compact range syntax used by
//! grammar authors (`"a-zA-Z_"`).
//!
//! # Example
//!
//! ```rust
//! use sprout::CharSet;
//!
//! let ident = CharSet::from_pattern("a-zA-Z_").unwrap();
//! assert!(ident.contains('q'));
//! assert!(!ident.contains('9'));
//! assert!(ident.complement().contains('9'));
//! ```

use super::error::GrammarError;

const MAX_CODE_POINT: u32 = 0x10FFFF;
const SURROGATE_LO: u32 = 0xD800;
const SURROGATE_HI: u32 = 0xDFFF;

/// A set of Unicode scalar values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CharSet {
    /// Sorted, disjoint, non-adjacent inclusive ranges without surrogates
    ranges: Vec<(u32, u32)>,
}

impl CharSet {
    /// The empty set
    #[inline]
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// All characters between `lo` and `hi` inclusive
    pub fn range(lo: char, hi: char) -> Self {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        Self::from_ranges(vec![(lo as u32, hi as u32)])
    }

    /// Set containing exactly the given characters
    pub fn from_chars<I: IntoIterator<Item = char>>(chars: I) -> Self {
        Self::from_ranges(chars.into_iter().map(|c| (c as u32, c as u32)).collect())
    }

    /// Parse the compact range syntax
    ///
    /// `a-z` is a range, `\` escapes the next character (`\n`, `\t`, `\r`
    /// are control characters), and a `-` at either end is literal.
    pub fn from_pattern(pattern: &str) -> Result<Self, GrammarError> {
        let mut items = Vec::new();
        let mut chars = pattern.chars().peekable();
        let mut escaped = Vec::new();

        while let Some(c) = chars.next() {
            let was_escape = c == '\\';
            let c = if was_escape {
                match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some(other) => other,
                    None => '\\',
                }
            } else {
                c
            };
            items.push(c);
            escaped.push(was_escape);
        }

        let mut ranges = Vec::new();
        let mut i = 0;
        while i < items.len() {
            let is_range = i + 2 < items.len() && items[i + 1] == '-' && !escaped[i + 1];
            if is_range {
                let (lo, hi) = (items[i], items[i + 2]);
                if lo > hi {
                    return Err(GrammarError::InvalidCharset {
                        pattern: pattern.to_string(),
                        reason: format!("range {:?}-{:?} is reversed", lo, hi),
                    });
                }
                ranges.push((lo as u32, hi as u32));
                i += 3;
            } else {
                ranges.push((items[i] as u32, items[i] as u32));
                i += 1;
            }
        }

        Ok(Self::from_ranges(ranges))
    }

    /// Whether `c` is a member
    #[inline]
    pub fn contains(&self, c: char) -> bool {
        let cp = c as u32;
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if hi < cp {
                    std::cmp::Ordering::Less
                } else if lo > cp {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Whether the set has no members
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Members of either set
    pub fn union(&self, other: &CharSet) -> CharSet {
        let mut ranges = self.ranges.clone();
        ranges.extend_from_slice(&other.ranges);
        Self::from_ranges(ranges)
    }

    /// Every scalar value not in this set
    pub fn complement(&self) -> CharSet {
        let mut ranges = Vec::with_capacity(self.ranges.len() + 1);
        let mut next = 0u32;
        for &(lo, hi) in &self.ranges {
            if lo > next {
                ranges.push((next, lo - 1));
            }
            next = hi + 1;
        }
        if next <= MAX_CODE_POINT {
            ranges.push((next, MAX_CODE_POINT));
        }
        Self::from_ranges(ranges)
    }

    /// Inclusive ranges as characters
    pub fn ranges(&self) -> impl Iterator<Item = (char, char)> + '_ {
        self.ranges.iter().filter_map(|&(lo, hi)| {
            Some((char::from_u32(lo)?, char::from_u32(hi)?))
        })
    }

    /// Equivalent regex character class
    pub fn to_pattern(&self) -> String {
        if self.ranges.is_empty() {
            // A class that matches nothing
            return "[^\\x{0}-\\x{10FFFF}]".to_string();
        }
        let mut out = String::from("[");
        for &(lo, hi) in &self.ranges {
            push_class_char(&mut out, lo);
            if hi != lo {
                out.push('-');
                push_class_char(&mut out, hi);
            }
        }
        out.push(']');
        out
    }

    fn from_ranges(mut ranges: Vec<(u32, u32)>) -> Self {
        ranges.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
        for (lo, hi) in ranges {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }

        // Surrogates are not scalar values; keep them out of the ranges
        let mut cleaned = Vec::with_capacity(merged.len());
        for (lo, hi) in merged {
            if hi < SURROGATE_LO || lo > SURROGATE_HI {
                cleaned.push((lo, hi));
                continue;
            }
            if lo < SURROGATE_LO {
                cleaned.push((lo, SURROGATE_LO - 1));
            }
            if hi > SURROGATE_HI {
                cleaned.push((SURROGATE_HI + 1, hi));
            }
        }
        Self { ranges: cleaned }
    }
}

impl FromIterator<char> for CharSet {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        Self::from_chars(iter)
    }
}

fn push_class_char(out: &mut String, cp: u32) {
    match char::from_u32(cp) {
        Some(c) if c.is_ascii_alphanumeric() => out.push(c),
        _ => out.push_str(&format!("\\x{{{:X}}}", cp)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_membership() {
        let digits = CharSet::range('0', '9');
        assert!(digits.contains('0'));
        assert!(digits.contains('9'));
        assert!(!digits.contains('a'));
    }

    #[test]
    fn test_reversed_range_is_normalized() {
        assert_eq!(CharSet::range('z', 'a'), CharSet::range('a', 'z'));
    }

    #[test]
    fn test_from_chars_merges_adjacent() {
        let set = CharSet::from_chars("cab".chars());
        assert_eq!(set, CharSet::range('a', 'c'));
    }

    #[test]
    fn test_complement() {
        let set = CharSet::from_chars(['x']);
        let inverted = set.complement();
        assert!(!inverted.contains('x'));
        assert!(inverted.contains('y'));
        assert!(inverted.contains('\u{10FFFF}'));
        assert_eq!(inverted.complement(), set);
    }

    #[test]
    fn test_union() {
        let set = CharSet::range('a', 'c').union(&CharSet::range('x', 'z'));
        assert!(set.contains('b'));
        assert!(set.contains('y'));
        assert!(!set.contains('m'));
    }

    #[test]
    fn test_from_pattern() {
        let set = CharSet::from_pattern("a-z_0-9").unwrap();
        assert!(set.contains('k'));
        assert!(set.contains('_'));
        assert!(set.contains('5'));
        assert!(!set.contains('-'));

        let dash = CharSet::from_pattern("-a").unwrap();
        assert!(dash.contains('-'));

        let escaped = CharSet::from_pattern("a\\-c").unwrap();
        assert!(escaped.contains('-'));
        assert!(!escaped.contains('b'));
    }

    #[test]
    fn test_from_pattern_reversed_range() {
        let err = CharSet::from_pattern("z-a").unwrap_err();
        assert!(matches!(err, GrammarError::InvalidCharset { .. }));
    }

    #[test]
    fn test_to_pattern_is_valid_regex() {
        let set = CharSet::from_pattern("a-z\\-.").unwrap();
        let re = regex::Regex::new(&format!("^{}$", set.to_pattern())).unwrap();
        assert!(re.is_match("q"));
        assert!(re.is_match("-"));
        assert!(re.is_match("."));
        assert!(!re.is_match("A"));

        let none = regex::Regex::new(&CharSet::new().to_pattern()).unwrap();
        assert!(!none.is_match("a"));
    }

    #[test]
    fn test_complement_skips_surrogates() {
        let everything = CharSet::new().complement();
        assert!(everything.ranges().count() == 2);
        assert!(everything.contains('\u{D7FF}'));
        assert!(everything.contains('\u{E000}'));
    }
}
