//! Natural ("human") ordering of file names.
//!
//! Names are split into runs of ASCII digits and runs of everything else.
//! Digit runs compare by numeric value, text runs compare
//! case-insensitively, and a digit run sorts before a text run. Names that
//! still tie fall back to plain string order so the result is total.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
enum Segment<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        let first = self.rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != digit)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(if digit {
            Segment::Digits(head)
        } else {
            Segment::Text(head)
        })
    }
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    // Arbitrary length: compare without parsing.
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn compare_segment(a: Segment<'_>, b: Segment<'_>) -> Ordering {
    match (a, b) {
        (Segment::Digits(x), Segment::Digits(y)) => compare_digits(x, y),
        (Segment::Text(x), Segment::Text(y)) => compare_text(x, y),
        (Segment::Digits(_), Segment::Text(_)) => Ordering::Less,
        (Segment::Text(_), Segment::Digits(_)) => Ordering::Greater,
    }
}

/// Compares two names in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Segments { rest: a };
    let mut right = Segments { rest: b };
    loop {
        match (left.next(), right.next()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match compare_segment(x, y) {
                Ordering::Equal => {}
                other => return other,
            },
        }
    }
    a.cmp(b)
}

/// Stable natural sort of `items` by the name `key` returns.
pub fn sort_natural_by<T>(items: &mut [T], key: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| natural_cmp(key(a), key(b)));
}
