use std::cmp::Ordering;
use std::fmt;

use malachite::Rational;

use super::error::{ModelError, Result};
use super::expression::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimepointKind {
    Start,
    End,
}

/// A point on the local timeline of a durative action: its start or end shifted by `delay`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timing {
    kind: TimepointKind,
    delay: Rational,
}

impl Timing {
    pub fn new(kind: TimepointKind, delay: Rational) -> Self {
        Self { kind, delay }
    }

    pub fn start() -> Self {
        Self::new(TimepointKind::Start, Rational::from(0))
    }

    pub fn end() -> Self {
        Self::new(TimepointKind::End, Rational::from(0))
    }

    pub fn start_plus(delay: impl Into<Rational>) -> Self {
        Self::new(TimepointKind::Start, delay.into())
    }

    pub fn end_plus(delay: impl Into<Rational>) -> Self {
        Self::new(TimepointKind::End, delay.into())
    }

    pub fn kind(&self) -> TimepointKind {
        self.kind
    }

    pub fn delay(&self) -> &Rational {
        &self.delay
    }

    /// Offset of this timing from the action start, given the actual duration.
    pub fn resolve(&self, duration: &Rational) -> Rational {
        match self.kind {
            TimepointKind::Start => self.delay.clone(),
            TimepointKind::End => duration + &self.delay,
        }
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let anchor = match self.kind {
            TimepointKind::Start => "start",
            TimepointKind::End => "end",
        };
        if self.delay == 0 {
            write!(f, "{}", anchor)
        } else if self.delay > 0 {
            write!(f, "{} + {}", anchor, self.delay)
        } else {
            write!(f, "{} - {}", anchor, -&self.delay)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeInterval {
    lower: Timing,
    upper: Timing,
    left_open: bool,
    right_open: bool,
}

impl TimeInterval {
    pub fn new(lower: Timing, upper: Timing, left_open: bool, right_open: bool) -> Self {
        Self { lower, upper, left_open, right_open }
    }

    pub fn closed(lower: Timing, upper: Timing) -> Self {
        Self::new(lower, upper, false, false)
    }

    pub fn open(lower: Timing, upper: Timing) -> Self {
        Self::new(lower, upper, true, true)
    }

    pub fn left_open(lower: Timing, upper: Timing) -> Self {
        Self::new(lower, upper, true, false)
    }

    pub fn right_open(lower: Timing, upper: Timing) -> Self {
        Self::new(lower, upper, false, true)
    }

    /// Degenerate interval holding a single timing.
    pub fn point(at: Timing) -> Self {
        Self::closed(at.clone(), at)
    }

    pub fn lower(&self) -> &Timing {
        &self.lower
    }

    pub fn upper(&self) -> &Timing {
        &self.upper
    }

    pub fn is_left_open(&self) -> bool {
        self.left_open
    }

    pub fn is_right_open(&self) -> bool {
        self.right_open
    }

    pub fn is_point(&self) -> bool {
        self.lower == self.upper && !self.left_open && !self.right_open
    }

    /// Absolute bounds of the interval relative to the action start.
    pub fn resolve(&self, duration: &Rational) -> (Rational, Rational) {
        (self.lower.resolve(duration), self.upper.resolve(duration))
    }

    pub fn contains(&self, t: &Rational, duration: &Rational) -> bool {
        let (lo, hi) = self.resolve(duration);
        let above = match t.cmp(&lo) {
            Ordering::Greater => true,
            Ordering::Equal => !self.left_open,
            Ordering::Less => false,
        };
        let below = match t.cmp(&hi) {
            Ordering::Less => true,
            Ordering::Equal => !self.right_open,
            Ordering::Greater => false,
        };
        above && below
    }

    /// Whether the two intervals share at least one instant once resolved against `duration`.
    pub fn overlaps(&self, other: &TimeInterval, duration: &Rational) -> bool {
        let (a_lo, a_hi) = self.resolve(duration);
        let (b_lo, b_hi) = other.resolve(duration);
        // the later of the two lower bounds must not pass the earlier upper bound
        let (lo, lo_open) = match a_lo.cmp(&b_lo) {
            Ordering::Greater => (a_lo, self.left_open),
            Ordering::Less => (b_lo, other.left_open),
            Ordering::Equal => (a_lo, self.left_open || other.left_open),
        };
        let (hi, hi_open) = match a_hi.cmp(&b_hi) {
            Ordering::Less => (a_hi, self.right_open),
            Ordering::Greater => (b_hi, other.right_open),
            Ordering::Equal => (a_hi, self.right_open || other.right_open),
        };
        match lo.cmp(&hi) {
            Ordering::Less => true,
            Ordering::Equal => !lo_open && !hi_open,
            Ordering::Greater => false,
        }
    }
}

impl From<Timing> for TimeInterval {
    fn from(value: Timing) -> Self {
        TimeInterval::point(value)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_point() {
            return write!(f, "[{}]", self.lower);
        }
        let l = if self.left_open { "(" } else { "[" };
        let r = if self.right_open { ")" } else { "]" };
        write!(f, "{}{}, {}{}", l, self.lower, self.upper, r)
    }
}

/// Admissible durations of a durative action, bounds are numeric expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Duration {
    lower: Expression,
    upper: Expression,
    left_open: bool,
    right_open: bool,
}

impl Duration {
    pub fn new(lower: Expression, upper: Expression, left_open: bool, right_open: bool) -> Result<Self> {
        for bound in [&lower, &upper] {
            if !bound.tpe().is_numeric() {
                return Err(ModelError::type_error(format!("duration bound {} is not numeric", bound)));
            }
        }
        Ok(Self { lower, upper, left_open, right_open })
    }

    pub fn fixed(value: Expression) -> Result<Self> {
        Self::new(value.clone(), value, false, false)
    }

    pub fn lower(&self) -> &Expression {
        &self.lower
    }

    pub fn upper(&self) -> &Expression {
        &self.upper
    }

    pub fn is_left_open(&self) -> bool {
        self.left_open
    }

    pub fn is_right_open(&self) -> bool {
        self.right_open
    }

    /// Checks a concrete duration against already evaluated bounds.
    pub fn admits(&self, lower: &Rational, upper: &Rational, value: &Rational) -> bool {
        let above = if self.left_open { value > lower } else { value >= lower };
        let below = if self.right_open { value < upper } else { value <= upper };
        above && below
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.lower == self.upper && !self.left_open && !self.right_open {
            return write!(f, "{}", self.lower);
        }
        let l = if self.left_open { "(" } else { "[" };
        let r = if self.right_open { ")" } else { "]" };
        write!(f, "{}{}, {}{}", l, self.lower, self.upper, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> Rational {
        Rational::from_signeds(n, d)
    }

    #[test]
    fn test_resolve() {
        let d = Rational::from(6);
        assert_eq!(Timing::start().resolve(&d), Rational::from(0));
        assert_eq!(Timing::end().resolve(&d), Rational::from(6));
        assert_eq!(Timing::start_plus(1).resolve(&d), Rational::from(1));
        assert_eq!(Timing::end_plus(q(-1, 2)).resolve(&d), q(11, 2));
        assert_eq!(Timing::end_plus(q(-1, 2)).to_string(), "end - 1/2");
        assert_eq!(Timing::start_plus(1).to_string(), "start + 1");
    }

    #[test]
    fn test_point_inside_interval() {
        let d = Rational::from(5);
        let closed = TimeInterval::closed(Timing::start(), Timing::end());
        let open = TimeInterval::open(Timing::start(), Timing::end());
        assert!(closed.contains(&Rational::from(0), &d));
        assert!(closed.contains(&Rational::from(5), &d));
        assert!(!open.contains(&Rational::from(0), &d));
        assert!(!open.contains(&Rational::from(5), &d));
        assert!(open.contains(&q(1, 100), &d));
        assert!(!closed.contains(&Rational::from(6), &d));
    }

    #[test]
    fn test_overlaps() {
        let d = Rational::from(5);
        let whole = TimeInterval::closed(Timing::start(), Timing::end());
        let at_end = TimeInterval::point(Timing::end());
        let after = TimeInterval::closed(Timing::end(), Timing::end_plus(2));
        let open_whole = TimeInterval::right_open(Timing::start(), Timing::end());
        assert!(whole.overlaps(&at_end, &d));
        assert!(whole.overlaps(&after, &d));
        assert!(!open_whole.overlaps(&at_end, &d));
        assert!(!open_whole.overlaps(&after, &d));
        assert!(at_end.is_point());
        assert_eq!(open_whole.to_string(), "[start, end)");
    }

    #[test]
    fn test_duration() {
        let fixed = Duration::fixed(6i64.into()).unwrap();
        let six = Rational::from(6);
        assert!(fixed.admits(&six, &six, &six));
        assert!(!fixed.admits(&six, &six, &Rational::from(5)));
        assert!(matches!(Duration::fixed(true.into()), Err(ModelError::Type(_))));
        let open = Duration::new(1i64.into(), 3i64.into(), true, false).unwrap();
        assert!(!open.admits(&Rational::from(1), &Rational::from(3), &Rational::from(1)));
        assert!(open.admits(&Rational::from(1), &Rational::from(3), &Rational::from(3)));
        assert_eq!(fixed.to_string(), "6");
    }
}
