use std::{error, fmt};

use bstr::ByteSlice;

pub type BogFieldResult<T> = Result<T, ParseFieldError>;
pub type BogParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, Copy)]
pub enum ParserTolerance {
    IgnoreAll,
    Safe,
    Pedantic,
}

impl Default for ParserTolerance {
    fn default() -> Self {
        Self::Safe
    }
}

/// Why a single field of an input line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFieldError {
    /// A read id that isn't a positive integer.
    ReadIdError,
    /// The field bytes aren't UTF-8.
    Utf8Error,
    /// An orientation other than + or -.
    OrientationError,
    /// A read end other than 5 or 3.
    ReadEndError,
    /// A numeric or structured field that didn't parse. Includes the
    /// field name.
    InvalidField(&'static str),
    /// The line ended before all required fields were read.
    MissingFields,
}

impl From<bstr::Utf8Error> for ParseFieldError {
    fn from(_: bstr::Utf8Error) -> Self {
        ParseFieldError::Utf8Error
    }
}

impl fmt::Display for ParseFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ParseFieldError as PFE;
        match self {
            PFE::ReadIdError => {
                write!(f, "Read id is not a positive integer")
            }
            PFE::Utf8Error => write!(f, "Field is not valid UTF-8"),
            PFE::OrientationError => {
                write!(f, "Orientation is not + or -")
            }
            PFE::ReadEndError => {
                write!(f, "Read end is not 5 or 3")
            }
            PFE::InvalidField(field) => {
                write!(f, "Invalid value for `{}`", field)
            }
            PFE::MissingFields => write!(f, "Line is missing required fields"),
        }
    }
}

impl error::Error for ParseFieldError {}

/// Why an input line was rejected or skipped.
#[derive(Debug)]
pub enum ParseError {
    /// The record type was something other than the known ones. This
    /// is skipped by the file parser under the default tolerance.
    UnknownLineType,
    /// Tried to parse an empty or comment line. Can be ignored.
    EmptyLine,
    /// A line couldn't be parsed. Includes the problem line and a
    /// variant describing the error.
    InvalidLine(ParseFieldError, String),
    /// Wrapper for an IO error.
    IOError(std::io::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ParseError as PE;
        match self {
            PE::UnknownLineType => write!(f, "Unknown record type"),
            PE::EmptyLine => write!(f, "Line was empty"),
            PE::InvalidLine(field_err, line) => {
                write!(f, "Failed to parse line {}, error: {}", line, field_err)
            }
            PE::IOError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl From<std::io::Error> for ParseError {
    #[inline]
    fn from(err: std::io::Error) -> Self {
        Self::IOError(err)
    }
}

impl error::Error for ParseError {}

impl ParseError {
    #[inline]
    pub(crate) fn invalid_line(error: ParseFieldError, line: &[u8]) -> Self {
        let mut dest = String::new();
        line.to_str_lossy_into(&mut dest);
        Self::InvalidLine(error, dest)
    }

    #[inline]
    pub fn can_safely_continue(&self, tol: &ParserTolerance) -> bool {
        use ParserTolerance as Tol;
        match tol {
            Tol::IgnoreAll => true,
            Tol::Safe => matches!(
                self,
                ParseError::EmptyLine | ParseError::UnknownLineType
            ),
            Tol::Pedantic => false,
        }
    }
}
