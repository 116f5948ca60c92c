pub mod error;

pub use self::error::*;

use bstr::{io::BufReadExt, ByteSlice};

use std::fs::File;
use std::io::BufReader;

use crate::best_overlap::{BestContainment, BestEdge};
use crate::fragment::{FragmentEnd, Orientation, ReadEnd, ReadId};

/// A read and its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRecord {
    pub id: ReadId,
    pub length: u32,
    pub library: u32,
}

/// The best overlap leaving one read end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRecord {
    pub from: FragmentEnd,
    pub edge: BestEdge,
}

/// A read and the read it is contained in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainmentRecord {
    pub id: ReadId,
    pub containment: BestContainment,
}

/// Enum containing the different kinds of input records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Read(ReadRecord),
    BestEdge(EdgeRecord),
    Containment(ContainmentRecord),
}

/// Every record of an input file, grouped by type, in file order.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct OverlapRecords {
    pub reads: Vec<ReadRecord>,
    pub edges: Vec<EdgeRecord>,
    pub containments: Vec<ContainmentRecord>,
}

impl OverlapRecords {
    pub fn insert_record(&mut self, record: Record) {
        use Record::*;
        match record {
            Read(r) => self.reads.push(r),
            BestEdge(e) => self.edges.push(e),
            Containment(c) => self.containments.push(c),
        }
    }

    /// The largest read id mentioned anywhere in the records.
    pub fn max_read_id(&self) -> ReadId {
        let reads = self.reads.iter().map(|r| r.id);
        let edges = self.edges.iter().flat_map(|e| {
            std::iter::once(e.from.id).chain(std::iter::once(e.edge.partner))
        });
        let conts = self.containments.iter().flat_map(|c| {
            std::iter::once(c.id)
                .chain(std::iter::once(c.containment.container))
        });
        reads.chain(edges).chain(conts).max().unwrap_or(0)
    }
}

pub(crate) fn next_field<I>(input: &mut I) -> BogFieldResult<I::Item>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    input.next().ok_or(ParseFieldError::MissingFields)
}

pub(crate) fn parse_next<I, T>(input: &mut I, field: &'static str) -> BogFieldResult<T>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
    T: std::str::FromStr,
{
    let tmp = next_field(input)?;
    let s = tmp.as_ref().to_str()?;
    s.parse().map_err(|_| ParseFieldError::InvalidField(field))
}

fn parse_read_id<I>(input: &mut I) -> BogFieldResult<ReadId>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    let tmp = next_field(input)?;
    let id: ReadId = tmp
        .as_ref()
        .to_str()?
        .parse()
        .map_err(|_| ParseFieldError::ReadIdError)?;
    if id == 0 {
        return Err(ParseFieldError::ReadIdError);
    }
    Ok(id)
}

fn parse_read_end<I>(input: &mut I) -> BogFieldResult<ReadEnd>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    let tmp = next_field(input)?;
    ReadEnd::from_bytes(tmp.as_ref()).ok_or(ParseFieldError::ReadEndError)
}

impl ReadRecord {
    fn parse_fields<I>(mut input: I) -> BogFieldResult<Self>
    where
        I: Iterator,
        I::Item: AsRef<[u8]>,
    {
        let id = parse_read_id(&mut input)?;
        let length = parse_next(&mut input, "length")?;
        let library = parse_next(&mut input, "library")?;
        Ok(ReadRecord {
            id,
            length,
            library,
        })
    }
}

impl EdgeRecord {
    fn parse_fields<I>(mut input: I) -> BogFieldResult<Self>
    where
        I: Iterator,
        I::Item: AsRef<[u8]>,
    {
        let id = parse_read_id(&mut input)?;
        let end = parse_read_end(&mut input)?;
        let partner = parse_read_id(&mut input)?;
        let partner_end = parse_read_end(&mut input)?;
        let a_hang = parse_next(&mut input, "a_hang")?;
        let b_hang = parse_next(&mut input, "b_hang")?;
        Ok(EdgeRecord {
            from: FragmentEnd::new(id, end),
            edge: BestEdge {
                partner,
                partner_end,
                a_hang,
                b_hang,
            },
        })
    }
}

impl ContainmentRecord {
    fn parse_fields<I>(mut input: I) -> BogFieldResult<Self>
    where
        I: Iterator,
        I::Item: AsRef<[u8]>,
    {
        let id = parse_read_id(&mut input)?;
        let container = parse_read_id(&mut input)?;
        let a_hang = parse_next(&mut input, "a_hang")?;
        let b_hang = parse_next(&mut input, "b_hang")?;
        let orient = next_field(&mut input)?;
        let orient = Orientation::parse_error(
            Orientation::from_bytes_plus_minus(orient.as_ref()),
        )?;
        Ok(ContainmentRecord {
            id,
            containment: BestContainment {
                container,
                a_hang,
                b_hang,
                same_orientation: orient == Orientation::Forward,
            },
        })
    }
}

/// Parser for the tab-delimited best-overlap input. Lines start with
/// a record type: `R` (read), `E` (best edge) or `C` (containment);
/// `#` starts a comment.
#[derive(Debug, Default, Clone)]
pub struct BogParser {
    tolerance: ParserTolerance,
}

impl BogParser {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_tolerance(tolerance: ParserTolerance) -> Self {
        BogParser { tolerance }
    }

    pub fn parse_line(&self, line: &[u8]) -> BogParseResult<Record> {
        let line = line.trim_end();
        if line.is_empty() || line[0] == b'#' {
            return Err(ParseError::EmptyLine);
        }

        let mut fields = line.split_str(b"\t");
        let hdr = fields.next().ok_or(ParseError::EmptyLine)?;

        let record = match hdr {
            b"R" => ReadRecord::parse_fields(&mut fields).map(Record::Read),
            b"E" => EdgeRecord::parse_fields(&mut fields).map(Record::BestEdge),
            b"C" => ContainmentRecord::parse_fields(&mut fields)
                .map(Record::Containment),
            _ => return Err(ParseError::UnknownLineType),
        };

        record.map_err(|err| ParseError::invalid_line(err, line))
    }

    pub fn parse_lines<I>(&self, lines: I) -> BogParseResult<OverlapRecords>
    where
        I: Iterator,
        I::Item: AsRef<[u8]>,
    {
        let mut records = OverlapRecords::default();

        for line in lines {
            match self.parse_line(line.as_ref()) {
                Ok(record) => records.insert_record(record),
                Err(err) if err.can_safely_continue(&self.tolerance) => (),
                Err(err) => return Err(err),
            };
        }

        Ok(records)
    }

    pub fn parse_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> BogParseResult<OverlapRecords> {
        let file = File::open(path.as_ref())?;
        let lines = BufReader::new(file).byte_lines();

        let mut records = OverlapRecords::default();

        for line in lines {
            let line = line?;
            match self.parse_line(&line) {
                Ok(record) => records.insert_record(record),
                Err(err) if err.can_safely_continue(&self.tolerance) => (),
                Err(err) => return Err(err),
            };
        }

        log::info!(
            "Parsed {} reads, {} best edges, {} containments from {}",
            records.reads.len(),
            records.edges.len(),
            records.containments.len(),
            path.as_ref().display()
        );

        Ok(records)
    }
}
