use anyhow::{Context, Result};
use bstr::{io::BufReadExt, ByteSlice};
use nom::{bytes::complete::tag, IResult};

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::best_overlap::BestOverlapProvider;
use crate::error::{BogError, BogResult};
use crate::fragment::{Orientation, ReadId, SeqInterval, UnitigId};
use crate::parser::{
    next_field, parse_next, BogFieldResult, BogParseResult, ParseError,
    ParseFieldError, ParserTolerance,
};
use crate::placement::PlacementRegistry;
use crate::reads::ReadMetadata;
use crate::unitig::{PlacedRead, Unitig};
use crate::unitig_graph::UnitigGraph;

/// One unitig as written to a layout file:
///
/// `U <id> <length> <reads> <cov stat> <read>,<read>,...`
///
/// with tab-separated fields and each read as
/// `<id><+|->:<begin>-<end>`, followed by `@<container>` for contained
/// reads.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitigLayout {
    pub id: UnitigId,
    pub length: i64,
    pub num_frags: usize,
    pub cov_stat: f64,
    pub reads: Vec<PlacedRead>,
}

impl UnitigLayout {
    pub fn from_unitig(tig: &Unitig, global_rate: Option<f64>) -> BogResult<Self> {
        Ok(UnitigLayout {
            id: tig.id(),
            length: tig.length(),
            num_frags: tig.num_frags(),
            cov_stat: tig.cov_stat(global_rate)?,
            reads: tig.reads().to_vec(),
        })
    }

    fn parse_orient(i: &[u8]) -> IResult<&[u8], Orientation> {
        use nom::{branch::alt, combinator::map};
        use Orientation::*;

        let fwd = map(tag("+"), |_| Forward);
        let bwd = map(tag("-"), |_| Backward);
        alt((fwd, bwd))(i)
    }

    pub(crate) fn parse_placed_read(i: &[u8]) -> IResult<&[u8], PlacedRead> {
        use nom::{
            character::complete::digit1,
            combinator::{map_res, opt, recognize},
            sequence::{pair, preceded},
        };

        let parse_id = map_res(digit1, |bs: &[u8]| {
            let s = unsafe { std::str::from_utf8_unchecked(bs) };
            s.parse::<ReadId>()
        });
        let parse_coord = map_res(recognize(pair(opt(tag("-")), digit1)), |bs: &[u8]| {
            let s = unsafe { std::str::from_utf8_unchecked(bs) };
            s.parse::<i64>()
        });

        let (i, id) = parse_id(i)?;
        let (i, orientation) = Self::parse_orient(i)?;
        let (i, _) = tag(":")(i)?;
        let (i, begin) = parse_coord(i)?;
        let (i, _) = tag("-")(i)?;
        let (i, end) = parse_coord(i)?;
        let (i, container) = opt(preceded(tag("@"), &parse_id))(i)?;

        Ok((
            i,
            PlacedRead {
                id,
                orientation,
                position: SeqInterval::new(begin, end),
                container,
            },
        ))
    }

    fn parse_reads(field: &[u8]) -> BogFieldResult<Vec<PlacedRead>> {
        field
            .split_str(b",")
            .map(|token| match Self::parse_placed_read(token) {
                Ok((rest, read)) if rest.is_empty() => Ok(read),
                _ => Err(ParseFieldError::InvalidField("placed read")),
            })
            .collect()
    }

    fn parse_fields<I>(mut input: I) -> BogFieldResult<Self>
    where
        I: Iterator,
        I::Item: AsRef<[u8]>,
    {
        let id = parse_next(&mut input, "unitig id")?;
        let length = parse_next(&mut input, "length")?;
        let num_frags = parse_next(&mut input, "read count")?;
        let cov_stat = parse_next(&mut input, "coverage statistic")?;
        let reads = Self::parse_reads(next_field(&mut input)?.as_ref())?;

        if reads.len() != num_frags {
            return Err(ParseFieldError::InvalidField("read count"));
        }

        Ok(UnitigLayout {
            id,
            length,
            num_frags,
            cov_stat,
            reads,
        })
    }

    pub fn parse_line(line: &[u8]) -> BogParseResult<Self> {
        let line = line.trim_end();
        if line.is_empty() || line[0] == b'#' {
            return Err(ParseError::EmptyLine);
        }

        let mut fields = line.split_str(b"\t");
        match fields.next() {
            Some(b"U") => (),
            _ => return Err(ParseError::UnknownLineType),
        }

        Self::parse_fields(&mut fields)
            .map_err(|err| ParseError::invalid_line(err, line))
    }
}

impl std::fmt::Display for UnitigLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "U\t{}\t{}\t{}\t{:.3}\t",
            self.id, self.length, self.num_frags, self.cov_stat
        )?;
        for (i, read) in self.reads.iter().enumerate() {
            if i != 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", read)?;
        }
        Ok(())
    }
}

/// Splits `layouts` into consecutive runs holding at least `target`
/// reads each, the last run possibly fewer. A target of 0 keeps
/// everything together.
pub fn partition_layouts(
    layouts: &[UnitigLayout],
    target: usize,
) -> Vec<&[UnitigLayout]> {
    if target == 0 || layouts.is_empty() {
        return vec![layouts];
    }

    let mut parts = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (ix, layout) in layouts.iter().enumerate() {
        count += layout.num_frags;
        if count >= target {
            parts.push(&layouts[start..=ix]);
            start = ix + 1;
            count = 0;
        }
    }
    if start < layouts.len() {
        parts.push(&layouts[start..]);
    }
    parts
}

pub fn write_layouts<W: Write>(layouts: &[UnitigLayout], out: W) -> Result<()> {
    let mut out = BufWriter::new(out);
    for layout in layouts {
        writeln!(out, "{}", layout)?;
    }
    out.flush()?;
    Ok(())
}

/// Reads every layout record of a file. Blank, comment and unknown
/// lines are skipped; a malformed layout is an error.
pub fn read_layouts<P: AsRef<Path>>(path: P) -> Result<Vec<UnitigLayout>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Couldn't open layout file '{}'", path.display()))?;

    let tolerance = ParserTolerance::Safe;
    let mut layouts = Vec::new();
    for (ix, line) in BufReader::new(file).byte_lines().enumerate() {
        let line = line?;
        match UnitigLayout::parse_line(&line) {
            Ok(layout) => layouts.push(layout),
            Err(err) if err.can_safely_continue(&tolerance) => (),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Bad layout on line {} of '{}'", ix + 1, path.display())
                })
            }
        }
    }
    Ok(layouts)
}

fn partition_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{:03}", index));
    PathBuf::from(name)
}

impl<'a, B, R> UnitigGraph<'a, B, R>
where
    B: BestOverlapProvider,
    R: ReadMetadata,
{
    /// Layout records of every live unitig, in id order.
    pub fn layouts(&self) -> BogResult<Vec<UnitigLayout>> {
        self.unitigs()
            .map(|tig| UnitigLayout::from_unitig(tig, self.global_arrival_rate()))
            .collect()
    }

    /// Writes the layouts to `path`, or, with a positive
    /// `fragment_count_target`, to `path.001`, `path.002`, ... with
    /// about that many reads in each. Returns the files written.
    pub fn write_layouts_to<P: AsRef<Path>>(&self, path: P) -> Result<Vec<PathBuf>> {
        let path = path.as_ref();
        let layouts = self.layouts()?;
        let target = self.config.fragment_count_target;

        let parts = partition_layouts(&layouts, target);
        let mut written = Vec::with_capacity(parts.len());
        for (ix, part) in parts.into_iter().enumerate() {
            let dest = if target == 0 {
                path.to_path_buf()
            } else {
                partition_path(path, ix + 1)
            };
            let file = File::create(&dest)
                .with_context(|| format!("Couldn't create '{}'", dest.display()))?;
            write_layouts(part, file)?;
            log::debug!("wrote {} unitigs to {}", part.len(), dest.display());
            written.push(dest);
        }

        log::info!("wrote {} unitigs to {} file(s)", layouts.len(), written.len());
        Ok(written)
    }

    /// Replaces every unitig with the given layouts. Unitigs are
    /// renumbered from 1 in the order given. Reads outside the read
    /// range, or placed twice, are an error and leave the graph as it
    /// was.
    pub fn load_layouts(&mut self, layouts: Vec<UnitigLayout>) -> BogResult<()> {
        let max_iid = self.registry.capacity();
        let mut registry = PlacementRegistry::new(max_iid);
        let mut unitigs: Vec<Option<Unitig>> = vec![None];

        for layout in layouts {
            let id = unitigs.len() as UnitigId;
            for read in layout.reads.iter() {
                if read.id == 0 || read.id > max_iid {
                    return Err(BogError::UnknownRead(read.id));
                }
                if read.is_contained() {
                    registry.place_contained(read.id, id)?;
                } else {
                    registry.place_dovetail(read.id, id)?;
                }
            }
            let mut tig = Unitig::with_reads(id, layout.reads);
            tig.sort();
            unitigs.push(Some(tig));
        }

        self.registry = registry;
        self.unitigs = unitigs;
        log::info!("loaded {} unitigs", self.num_unitigs());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitigConfig;
    use crate::unitig_graph::tests::discordant_chains;
    use Orientation::*;

    fn sample_tig() -> Unitig {
        let iv = SeqInterval::new;
        Unitig::with_reads(
            1,
            vec![
                PlacedRead::dovetail(1, Forward, iv(0, 1000)),
                PlacedRead::contained(4, Backward, iv(200, 500), 1),
                PlacedRead::dovetail(2, Forward, iv(800, 1800)),
                PlacedRead::dovetail(3, Forward, iv(1600, 2600)),
            ],
        )
    }

    #[test]
    fn layout_line() {
        let tig = sample_tig();
        let layout = UnitigLayout::from_unitig(&tig, Some(3.0 / 1600.0)).unwrap();
        assert_eq!(
            "U\t1\t2600\t4\t0.000\t1+:0-1000,4-:200-500@1,2+:800-1800,3+:1600-2600",
            layout.to_string()
        );

        let parsed = UnitigLayout::parse_line(layout.to_string().as_bytes()).unwrap();
        assert_eq!(layout, parsed);

        assert_eq!(
            Err(BogError::ArrivalRateUnset),
            UnitigLayout::from_unitig(&tig, None).map(|_| ())
        );
    }

    #[test]
    fn parse_placed_reads() {
        let (rest, read) = UnitigLayout::parse_placed_read(b"5-:-20-980").unwrap();
        assert!(rest.is_empty());
        assert_eq!(5, read.id);
        assert_eq!(Backward, read.orientation);
        assert_eq!(SeqInterval::new(-20, 980), read.position);
        assert_eq!(None, read.container);

        let (rest, read) = UnitigLayout::parse_placed_read(b"12+:3-9@7,").unwrap();
        assert_eq!(b",", rest);
        assert_eq!(Some(7), read.container);

        assert!(UnitigLayout::parse_placed_read(b"5*:0-10").is_err());
        assert!(UnitigLayout::parse_placed_read(b"x+:0-10").is_err());
    }

    #[test]
    fn reject_bad_layouts() {
        let err = UnitigLayout::parse_line(b"U\t1\t100\t2\t0.5\t1+:0-100").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidLine(ParseFieldError::InvalidField("read count"), _)
        ));

        let err = UnitigLayout::parse_line(b"U\t1\t100\t1\t0.5\t1+:0-100junk").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidLine(ParseFieldError::InvalidField("placed read"), _)
        ));

        assert!(matches!(
            UnitigLayout::parse_line(b"X\t1"),
            Err(ParseError::UnknownLineType)
        ));
        assert!(matches!(
            UnitigLayout::parse_line(b"# comment"),
            Err(ParseError::EmptyLine)
        ));
    }

    #[test]
    fn partitions_hold_the_target() {
        let tig = sample_tig();
        let layout = UnitigLayout::from_unitig(&tig, Some(0.001)).unwrap();
        let layouts = vec![layout.clone(), layout.clone(), layout];

        assert_eq!(1, partition_layouts(&layouts, 0).len());
        let sizes: Vec<_> = partition_layouts(&layouts, 5).iter().map(|p| p.len()).collect();
        assert_eq!(vec![2, 1], sizes);
        let sizes: Vec<_> = partition_layouts(&layouts, 4).iter().map(|p| p.len()).collect();
        assert_eq!(vec![1, 1, 1], sizes);
    }

    #[test]
    fn graph_layouts_survive_a_file() {
        let (bog, info) = discordant_chains();
        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        graph.run().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unitigs.lay");
        let written = graph.write_layouts_to(&path).unwrap();
        assert_eq!(vec![path.clone()], written);

        let layouts = read_layouts(&path).unwrap();
        assert_eq!(2, layouts.len());

        let mut reloaded = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        reloaded.load_layouts(layouts).unwrap();
        reloaded.check_placement().unwrap();

        let originals: Vec<_> = graph.unitigs().map(|t| t.reads().to_vec()).collect();
        let loaded: Vec<_> = reloaded.unitigs().map(|t| t.reads().to_vec()).collect();
        assert_eq!(originals, loaded);
        assert_eq!(vec![1, 2], reloaded.unitigs().map(|t| t.id()).collect::<Vec<_>>());
    }

    #[test]
    fn partitioned_files() {
        let (bog, info) = discordant_chains();
        let mut conf = UnitigConfig::default();
        conf.fragment_count_target = 4;
        let mut graph = UnitigGraph::new(&bog, &info, conf).unwrap();
        graph.run().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unitigs.lay");
        let written = graph.write_layouts_to(&path).unwrap();

        assert_eq!(
            vec![dir.path().join("unitigs.lay.001"), dir.path().join("unitigs.lay.002")],
            written
        );
        let total: usize = written
            .iter()
            .map(|p| read_layouts(p).unwrap().len())
            .sum();
        assert_eq!(2, total);
    }

    #[test]
    fn reads_outside_the_range_are_rejected() {
        let (bog, info) = discordant_chains();
        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();

        let layout = UnitigLayout::parse_line(b"U\t1\t1000\t1\t0\t12+:0-1000").unwrap();
        assert_eq!(Err(BogError::UnknownRead(12)), graph.load_layouts(vec![layout]));
    }

    #[test]
    fn failed_loads_leave_the_graph_alone() {
        let (bog, info) = discordant_chains();
        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        graph.build().unwrap();
        let before: Vec<Unitig> = graph.unitigs().cloned().collect();

        let good = UnitigLayout::parse_line(b"U\t1\t1800\t2\t0\t1+:0-1000,2+:800-1800").unwrap();
        let bad = UnitigLayout::parse_line(b"U\t2\t1000\t1\t0\t12+:0-1000").unwrap();
        assert_eq!(
            Err(BogError::UnknownRead(12)),
            graph.load_layouts(vec![good.clone(), bad])
        );
        let twice = UnitigLayout::parse_line(b"U\t2\t1000\t1\t0\t2+:0-1000").unwrap();
        assert_eq!(
            Err(BogError::AlreadyPlaced { read: 2, unitig: 1 }),
            graph.load_layouts(vec![good, twice])
        );

        let after: Vec<Unitig> = graph.unitigs().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(Some(1), graph.registry().unitig_of(5));
        graph.check_placement().unwrap();
    }
}
