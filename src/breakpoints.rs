use crate::best_overlap::BestOverlapProvider;
use crate::config::UnitigConfig;
use crate::containment::recompute_fragment_positions;
use crate::error::BogResult;
use crate::fragment::{FragmentEnd, SeqInterval, UnitigId};
use crate::placement::Placement;
use crate::reads::ReadMetadata;
use crate::unitig::{PlacedRead, Unitig};
use crate::unitig_graph::UnitigGraph;

/// A read end inside a unitig whose best edge leads into another
/// unitig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakPoint {
    /// Index of the read among the dovetail reads of its unitig.
    pub frag_number: usize,
    pub position: SeqInterval,
    /// The discordant read end.
    pub end: FragmentEnd,
    /// Whether `end` faces the start of the layout.
    pub at_head: bool,
    /// Where the best edge of `end` goes.
    pub partner: FragmentEnd,
    /// Length of the unitig `partner` is in.
    pub in_size: i64,
    /// Reads in the unitig `partner` is in.
    pub in_frags: usize,
}

impl BreakPoint {
    /// Number of dovetail reads kept before the cut. A discordant head
    /// end cuts in front of its read, a tail end behind it.
    pub fn cut(&self) -> usize {
        if self.at_head {
            self.frag_number
        } else {
            self.frag_number + 1
        }
    }

    pub fn is_big(&self, config: &UnitigConfig) -> bool {
        self.in_size >= config.min_break_length
            && self.in_frags > config.min_break_frags
    }
}

impl std::fmt::Display for BreakPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frag {} ({} at {}) -> {}, into {} bp / {} reads",
            self.frag_number,
            self.end,
            self.position,
            self.partner,
            self.in_size,
            self.in_frags
        )
    }
}

/// The last accepted break. Later breaks must not move backwards.
#[derive(Debug, Default, Clone, Copy)]
struct BreakCursor {
    last_coord: Option<i64>,
    last_frag: Option<usize>,
    last_cut: usize,
}

impl BreakCursor {
    fn admits(&self, bp: &BreakPoint) -> bool {
        self.last_coord.map_or(true, |c| bp.position.begin >= c)
            && self.last_frag.map_or(true, |f| bp.frag_number >= f)
            && bp.cut() > self.last_cut
    }

    fn accept(&mut self, bp: &BreakPoint) {
        self.last_coord = Some(bp.position.begin);
        self.last_frag = Some(bp.frag_number);
        self.last_cut = bp.cut();
    }
}

/// Of a run of small breaks, the one leading into the largest unitig,
/// the earliest on ties. Only breaks that keep the cursor moving
/// forward and, if `before` is given, cut ahead of it qualify.
fn select_small(
    small: &[BreakPoint],
    before: Option<&BreakPoint>,
    cursor: &BreakCursor,
) -> Option<BreakPoint> {
    let mut best: Option<BreakPoint> = None;
    for bp in small {
        if !cursor.admits(bp) || before.map_or(false, |b| bp.cut() >= b.cut()) {
            continue;
        }
        if best.map_or(true, |b| bp.in_size > b.in_size) {
            best = Some(*bp);
        }
    }
    best
}

/// Chooses which candidate breaks to cut at, front to back. Big
/// breaks are honoured whenever they move forward. Small breaks are
/// collected; one of them is honoured just before the next big break,
/// or at the end if the run has discordant ends facing both ways.
pub fn filter_break_points(
    breaks: &[BreakPoint],
    config: &UnitigConfig,
) -> Vec<BreakPoint> {
    let mut sorted = breaks.to_vec();
    sorted.sort_by_key(|bp| (bp.frag_number, !bp.at_head));

    let mut cursor = BreakCursor::default();
    let mut kept = Vec::new();
    let mut small = Vec::new();

    for bp in sorted {
        if !bp.is_big(config) {
            small.push(bp);
            continue;
        }

        if let Some(s) = select_small(&small, Some(&bp), &cursor) {
            cursor.accept(&s);
            kept.push(s);
        }
        small.clear();

        if cursor.admits(&bp) {
            cursor.accept(&bp);
            kept.push(bp);
        } else {
            log::debug!("dropping break {}, behind the last one", bp);
        }
    }

    let has_head = small.iter().any(|bp| bp.at_head);
    let has_tail = small.iter().any(|bp| !bp.at_head);
    if has_head && has_tail {
        if let Some(s) = select_small(&small, None, &cursor) {
            kept.push(s);
        }
    }

    kept
}

impl<'a, B, R> UnitigGraph<'a, B, R>
where
    B: BestOverlapProvider,
    R: ReadMetadata,
{
    /// Every internal dovetail read end of unitig `id` whose best edge
    /// leads to a dovetail read other than its neighbour in the
    /// layout, either in another unitig or further along this one.
    /// The first read's head and the last read's tail are unitig ends,
    /// not breaks.
    pub fn find_break_points(&self, id: UnitigId) -> Vec<BreakPoint> {
        let tig = match self.unitig(id) {
            Some(t) => t,
            None => return Vec::new(),
        };

        let dovetail: Vec<&PlacedRead> = tig.dovetail_reads().collect();
        let mut breaks = Vec::new();

        for (frag_number, read) in dovetail.iter().enumerate() {
            // the read end facing each neighbour, if there is one
            let ends = [
                (
                    read.head_end(),
                    true,
                    frag_number
                        .checked_sub(1)
                        .map(|ix| FragmentEnd::new(dovetail[ix].id, dovetail[ix].tail_end())),
                ),
                (
                    read.tail_end(),
                    false,
                    dovetail
                        .get(frag_number + 1)
                        .map(|r| FragmentEnd::new(r.id, r.head_end())),
                ),
            ];
            for &(end, at_head, neighbour) in ends.iter() {
                let neighbour = match neighbour {
                    Some(nb) => nb,
                    None => continue,
                };
                let edge = match self.bog.best_edge(read.id, end) {
                    Some(e) => e,
                    None => continue,
                };
                if self.bog.is_contained(edge.partner) || edge.target() == neighbour {
                    continue;
                }
                // another unitig, or a read of this one that isn't next door
                let other = match self.registry.get(edge.partner) {
                    Ok(Placement::Dovetail(t)) => t,
                    _ => continue,
                };
                let other = match self.unitig(other) {
                    Some(t) => t,
                    None => continue,
                };

                breaks.push(BreakPoint {
                    frag_number,
                    position: read.position,
                    end: FragmentEnd::new(read.id, end),
                    at_head,
                    partner: edge.target(),
                    in_size: other.length(),
                    in_frags: other.num_frags(),
                });
            }
        }

        breaks
    }

    /// Splits unitig `id` at the cuts of `breaks`, taken in order. Cuts
    /// that would leave an empty side, or that don't move forward, are
    /// skipped. The pieces get new ids, recomputed coordinates, and
    /// their contained reads back; the original unitig is dropped.
    /// Returns the ids of the pieces, empty if nothing was cut.
    pub fn break_unitig_at(
        &mut self,
        id: UnitigId,
        breaks: &[BreakPoint],
    ) -> BogResult<Vec<UnitigId>> {
        let n = match self.unitig(id) {
            Some(t) => t.num_dovetail(),
            None => return Ok(Vec::new()),
        };

        let mut cuts = Vec::with_capacity(breaks.len());
        for bp in breaks {
            let cut = bp.cut();
            if cut == 0 || cut >= n {
                log::debug!("unitig {}: break {} leaves an empty side", id, bp);
                continue;
            }
            if cuts.last().map_or(false, |&last| cut <= last) {
                log::debug!("unitig {}: break {} is out of order", id, bp);
                continue;
            }
            cuts.push(cut);
        }
        if cuts.is_empty() {
            return Ok(Vec::new());
        }

        let tig = match self.unitigs.get_mut(id as usize).and_then(Option::take) {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };

        let (dovetail, contained): (Vec<PlacedRead>, Vec<PlacedRead>) = tig
            .into_reads()
            .into_iter()
            .partition(|r| !r.is_contained());
        for r in contained.iter() {
            self.registry.release(r.id)?;
        }

        let mut bounds = Vec::with_capacity(cuts.len() + 2);
        bounds.push(0);
        bounds.extend(cuts);
        bounds.push(n);

        let mut pieces = Vec::with_capacity(bounds.len() - 1);
        for w in bounds.windows(2) {
            let piece_id = self.next_unitig_id();
            let reads = dovetail[w[0]..w[1]].to_vec();
            for r in reads.iter() {
                self.registry.reassign(r.id, piece_id)?;
            }

            let mut piece = Unitig::with_reads(piece_id, reads);
            recompute_fragment_positions(
                &mut piece,
                &mut self.registry,
                &self.containers,
                self.bog,
                self.reads,
            )?;
            pieces.push(self.push_unitig(piece));
        }

        log::debug!("unitig {} split into {:?}", id, pieces);
        Ok(pieces)
    }

    /// Finds, filters, and cuts at the breaks of every unitig live when
    /// the pass starts. Returns the number of unitigs that were split.
    pub fn break_unitigs(&mut self) -> BogResult<usize> {
        let mut broken = 0;
        let mut created = 0;

        for id in self.live_ids() {
            let breaks = self.find_break_points(id);
            if breaks.is_empty() {
                continue;
            }
            let selected = filter_break_points(&breaks, &self.config);
            let pieces = self.break_unitig_at(id, &selected)?;
            if !pieces.is_empty() {
                broken += 1;
                created += pieces.len();
            }
        }

        log::info!("split {} unitigs into {} pieces", broken, created);
        Ok(broken)
    }

    /// Every candidate break of every live unitig, also written to the
    /// log.
    pub fn print_unitig_breaks(&self) -> Vec<(UnitigId, Vec<BreakPoint>)> {
        let mut report = Vec::new();
        for id in self.live_ids() {
            let breaks = self.find_break_points(id);
            if breaks.is_empty() {
                continue;
            }
            for bp in breaks.iter() {
                log::info!("unitig {} break: {}", id, bp);
            }
            report.push((id, breaks));
        }
        report
    }
}
