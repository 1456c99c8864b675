//! Splitting a time interval into contiguous scan partitions.
//!
//! Interval keys are fixed-precision decimal text (`1580274000`,
//! `1580274000.250`). Boundaries are interpolated numerically and rendered back
//! in the same format so they sort correctly against the stored keys.
//!
//! Adjacent partitions share a boundary key. Each partition owns its closing
//! boundary, so every partition but the first starts just past its opening
//! boundary.

use core::fmt;

use crate::error::RangeError;

/// Largest number of significant digits an interval key may carry.
const MAX_DIGITS: usize = 38;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    index: usize,
    start: String,
    end: String,
    start_inclusive: bool,
}

impl Partition {
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Closing boundary, fetched by the owning scanner.
    #[must_use]
    pub fn end(&self) -> &str {
        &self.end
    }

    /// First key the scanner asks for.
    ///
    /// For an exclusive start this is the immediate byte-order successor of the
    /// opening boundary.
    #[must_use]
    pub fn scan_start(&self) -> Vec<u8> {
        let mut key = self.start.as_bytes().to_vec();

        if !self.start_inclusive {
            key.push(0);
        }

        key
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.start_inclusive { '[' } else { '(' };

        write!(f, "#{} {open}{}, {}]", self.index, self.start, self.end)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RangePartitioner {
    parts: usize,
}

impl RangePartitioner {
    pub const fn new(parts: usize) -> Result<Self, RangeError> {
        if parts == 0 {
            return Err(RangeError::NoPartitions);
        }

        Ok(Self { parts })
    }

    /// Splits `[start, end]` into at most `parts` partitions.
    ///
    /// Intervals too narrow to give every partition a distinct boundary yield
    /// fewer partitions. So do intervals whose keys differ in width: an
    /// interpolated boundary that does not sort strictly between its
    /// neighbours in byte order is dropped, and its keys stay with the next
    /// partition.
    #[expect(clippy::integer_division, reason = "boundaries are floored")]
    pub fn split(&self, start: &str, end: &str) -> Result<Vec<Partition>, RangeError> {
        let lo = Decimal::parse(start)?;
        let hi = Decimal::parse(end)?;

        let scale = lo.scale.max(hi.scale);
        let (lo_units, hi_units) = (lo.units(scale, start)?, hi.units(scale, end)?);

        if lo_units > hi_units {
            return Err(RangeError::Inverted {
                start: start.to_owned(),
                end: end.to_owned(),
            });
        }

        if start > end {
            return Err(RangeError::Unordered {
                start: start.to_owned(),
                end: end.to_owned(),
            });
        }

        let span = hi_units - lo_units;
        let parts = self.parts as u128;
        let (step, rem) = (span / parts, span % parts);

        let mut boundaries = Vec::with_capacity(self.parts + 1);
        boundaries.push(start.to_owned());

        for i in 1..self.parts {
            let i = i as u128;
            let boundary = render(lo_units + step * i + rem * i / parts, scale, lo.int_width);

            let fits = boundaries
                .last()
                .is_some_and(|last| *last < boundary)
                && boundary.as_str() < end;

            if fits {
                boundaries.push(boundary);
            }
        }

        if start == end {
            return Ok(vec![Partition {
                index: 0,
                start: start.to_owned(),
                end: end.to_owned(),
                start_inclusive: true,
            }]);
        }

        boundaries.push(end.to_owned());

        Ok(boundaries
            .windows(2)
            .enumerate()
            .map(|(index, pair)| Partition {
                index,
                start: pair[0].clone(),
                end: pair[1].clone(),
                start_inclusive: index == 0,
            })
            .collect())
    }
}

struct Decimal<'a> {
    int: &'a str,
    frac: &'a str,
    int_width: usize,
    scale: usize,
}

impl<'a> Decimal<'a> {
    fn parse(key: &'a str) -> Result<Self, RangeError> {
        let unparsable = || RangeError::Unparsable {
            key: key.to_owned(),
        };

        let (int, frac) = match key.split_once('.') {
            Some((int, frac)) if !frac.is_empty() => (int, frac),
            Some(_) => return Err(unparsable()),
            None => (key, ""),
        };

        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());

        if int.is_empty() || !digits(int) || !digits(frac) || int.len() + frac.len() > MAX_DIGITS {
            return Err(unparsable());
        }

        Ok(Self {
            int,
            frac,
            int_width: int.len(),
            scale: frac.len(),
        })
    }

    fn units(&self, scale: usize, key: &str) -> Result<u128, RangeError> {
        format!("{}{:0<scale$}", self.int, self.frac)
            .parse()
            .map_err(|_| RangeError::Unparsable {
                key: key.to_owned(),
            })
    }
}

fn render(units: u128, scale: usize, int_width: usize) -> String {
    let width = int_width + scale;
    let digits = format!("{units:0>width$}");

    if scale == 0 {
        return digits;
    }

    let (int, frac) = digits.split_at(digits.len() - scale);

    format!("{int}.{frac}")
}
