#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::parser::ParseFieldError;

/// Reads are identified by positive integers; 0 is never a valid read.
pub type ReadId = u32;

/// Unitigs are numbered from 1 by the graph that creates them.
pub type UnitigId = u32;

/// Represents the strand a read is placed on in a unitig layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum Orientation {
    Forward,
    Backward,
}

impl Orientation {
    /// Parse an orientation from a single-element, where + is
    /// Forward, - is Backward
    #[inline]
    pub fn from_bytes_plus_minus<T: AsRef<[u8]>>(bs: T) -> Option<Self> {
        match bs.as_ref() {
            b"+" => Some(Orientation::Forward),
            b"-" => Some(Orientation::Backward),
            _ => None,
        }
    }

    #[inline]
    pub fn parse_error(opt: Option<Self>) -> Result<Self, ParseFieldError> {
        opt.ok_or(ParseFieldError::OrientationError)
    }

    #[inline]
    pub fn plus_minus_as_byte(&self) -> u8 {
        match self {
            Self::Forward => b'+',
            Self::Backward => b'-',
        }
    }

    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    #[inline]
    pub fn is_reverse(&self) -> bool {
        *self == Self::Backward
    }

    /// The end of a read placed with this orientation that faces the
    /// start of the layout.
    #[inline]
    pub fn head_end(&self) -> ReadEnd {
        match self {
            Self::Forward => ReadEnd::FivePrime,
            Self::Backward => ReadEnd::ThreePrime,
        }
    }

    /// The end of a read placed with this orientation that faces the
    /// end of the layout.
    #[inline]
    pub fn tail_end(&self) -> ReadEnd {
        self.head_end().opposite()
    }

    /// A read entered through `end` is laid out so that `end` is its
    /// head.
    #[inline]
    pub fn entered_through(end: ReadEnd) -> Self {
        match end {
            ReadEnd::FivePrime => Self::Forward,
            ReadEnd::ThreePrime => Self::Backward,
        }
    }
}

/// Default orientation is forward
impl Default for Orientation {
    #[inline]
    fn default() -> Orientation {
        Orientation::Forward
    }
}

/// Display uses `+` for `Forward` and `-` for `Backward`.
///
/// # Examples
///
/// ```
/// use bogtig::fragment::Orientation as O;
///
/// assert_eq!(&format!("{}", O::Forward), "+");
/// assert_eq!(&format!("{}", O::Backward), "-");
/// ```
impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", char::from(self.plus_minus_as_byte()))
    }
}

impl std::str::FromStr for Orientation {
    type Err = &'static str;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Orientation::from_bytes_plus_minus(s.as_bytes())
            .ok_or("Could not parse orientation (was not + or -)")
    }
}

/// One of the two ends of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum ReadEnd {
    FivePrime,
    ThreePrime,
}

impl ReadEnd {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Self::FivePrime => Self::ThreePrime,
            Self::ThreePrime => Self::FivePrime,
        }
    }

    /// Index into per-end tables, 5' first.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::FivePrime => 0,
            Self::ThreePrime => 1,
        }
    }

    /// Parses `5` or `3`.
    #[inline]
    pub fn from_bytes<T: AsRef<[u8]>>(bs: T) -> Option<Self> {
        match bs.as_ref() {
            b"5" => Some(Self::FivePrime),
            b"3" => Some(Self::ThreePrime),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReadEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FivePrime => write!(f, "5'"),
            Self::ThreePrime => write!(f, "3'"),
        }
    }
}

/// A specific end of a specific read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct FragmentEnd {
    pub id: ReadId,
    pub end: ReadEnd,
}

impl FragmentEnd {
    #[inline]
    pub fn new(id: ReadId, end: ReadEnd) -> Self {
        FragmentEnd { id, end }
    }
}

impl std::fmt::Display for FragmentEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.id, self.end)
    }
}

/// Half-open interval `[begin, end)` in unitig coordinates. `begin` is
/// always the smaller coordinate; strand is stored separately.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct SeqInterval {
    pub begin: i64,
    pub end: i64,
}

impl SeqInterval {
    #[inline]
    pub fn new(begin: i64, end: i64) -> Self {
        SeqInterval { begin, end }
    }

    #[inline]
    pub fn len(&self) -> i64 {
        self.end - self.begin
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    #[inline]
    pub fn shifted(&self, offset: i64) -> Self {
        SeqInterval::new(self.begin + offset, self.end + offset)
    }

    /// The interval as it lies on the other strand of a layout of
    /// length `length`.
    #[inline]
    pub fn mirrored(&self, length: i64) -> Self {
        SeqInterval::new(length - self.end, length - self.begin)
    }
}

impl std::fmt::Display for SeqInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}
