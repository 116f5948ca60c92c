#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use fnv::FnvHashMap;

use crate::best_overlap::{BestEdge, BestOverlapProvider};
use crate::error::{BogError, BogResult};
use crate::fragment::{Orientation, ReadEnd, ReadId, SeqInterval, UnitigId};
use crate::reads::ReadMetadata;

/// A read as laid out in a unitig. Reads placed by the walk have no
/// container; reads placed by containment remember which read put
/// them there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct PlacedRead {
    pub id: ReadId,
    pub orientation: Orientation,
    pub position: SeqInterval,
    pub container: Option<ReadId>,
}

impl PlacedRead {
    pub fn dovetail(
        id: ReadId,
        orientation: Orientation,
        position: SeqInterval,
    ) -> Self {
        PlacedRead {
            id,
            orientation,
            position,
            container: None,
        }
    }

    pub fn contained(
        id: ReadId,
        orientation: Orientation,
        position: SeqInterval,
        container: ReadId,
    ) -> Self {
        PlacedRead {
            id,
            orientation,
            position,
            container: Some(container),
        }
    }

    #[inline]
    pub fn is_contained(&self) -> bool {
        self.container.is_some()
    }

    #[inline]
    pub fn begin(&self) -> i64 {
        self.position.begin
    }

    #[inline]
    pub fn end(&self) -> i64 {
        self.position.end
    }

    #[inline]
    pub fn len(&self) -> i64 {
        self.position.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// The read end facing the start of the layout.
    #[inline]
    pub fn head_end(&self) -> ReadEnd {
        self.orientation.head_end()
    }

    /// The read end facing the end of the layout; walks leave a read
    /// through this end.
    #[inline]
    pub fn tail_end(&self) -> ReadEnd {
        self.orientation.tail_end()
    }
}

impl std::fmt::Display for PlacedRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}:{}", self.id, self.orientation, self.position)?;
        if let Some(c) = self.container {
            write!(f, "@{}", c)?;
        }
        Ok(())
    }
}

/// Where read `next`, of length `next_len`, lands when the layout is
/// extended out of the tail end of `prev`.
///
/// The best edge leaving `prev` is used when it points at `next`;
/// otherwise a best edge from `next` back into the tail of `prev`.
/// Returns `None` when neither read names the other.
pub fn place_next<B, R>(
    bog: &B,
    reads: &R,
    prev: &PlacedRead,
    next: ReadId,
    next_len: i64,
) -> Option<PlacedRead>
where
    B: BestOverlapProvider,
    R: ReadMetadata,
{
    let exit = prev.tail_end();

    if let Some(edge) = bog.best_edge(prev.id, exit) {
        if edge.partner == next {
            let begin = prev.begin() + edge.a_hang as i64;
            let begin = clamp_hop(reads, prev, next_len, begin, prev.id, &edge);
            return Some(PlacedRead::dovetail(
                next,
                Orientation::entered_through(edge.partner_end),
                SeqInterval::new(begin, begin + next_len),
            ));
        }
    }

    for &end in [ReadEnd::FivePrime, ReadEnd::ThreePrime].iter() {
        let back = match bog.best_edge(next, end) {
            Some(e) if e.partner == prev.id && e.partner_end == exit => e,
            _ => continue,
        };
        let begin = prev.end() + back.a_hang as i64 - next_len;
        let begin = clamp_hop(reads, prev, next_len, begin, next, &back);
        return Some(PlacedRead::dovetail(
            next,
            Orientation::entered_through(end),
            SeqInterval::new(begin, begin + next_len),
        ));
    }

    None
}

/// Start of a read of length `next_len` placed at `begin` after
/// `prev`. When the overlap with `prev` this implies is impossible,
/// the read is pulled back to the clamped overlap length of `edge`,
/// leaving `from`.
pub(crate) fn clamp_hop<R: ReadMetadata>(
    reads: &R,
    prev: &PlacedRead,
    next_len: i64,
    begin: i64,
    from: ReadId,
    edge: &BestEdge,
) -> i64 {
    let clamped = reads.overlap_length(from, edge.partner, edge.a_hang, edge.b_hang) as i64;
    let implied = prev.end() - begin;
    if implied > 0 && implied <= prev.len().min(next_len) {
        return begin;
    }
    log::debug!(
        "overlap of {} and {} clamped from {} to {}",
        from,
        edge.partner,
        implied,
        clamped
    );
    prev.end() - clamped
}

/// An ordered layout of placed reads with derived coverage
/// statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Unitig {
    id: UnitigId,
    reads: Vec<PlacedRead>,
    local_arrival_rate: Option<f64>,
}

impl Unitig {
    pub fn new(id: UnitigId) -> Self {
        Unitig {
            id,
            reads: Vec::new(),
            local_arrival_rate: None,
        }
    }

    pub fn with_reads(id: UnitigId, reads: Vec<PlacedRead>) -> Self {
        Unitig {
            id,
            reads,
            local_arrival_rate: None,
        }
    }

    pub fn id(&self) -> UnitigId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: UnitigId) {
        self.id = id;
    }

    pub fn reads(&self) -> &[PlacedRead] {
        &self.reads
    }

    pub(crate) fn reads_mut(&mut self) -> &mut Vec<PlacedRead> {
        &mut self.reads
    }

    pub(crate) fn into_reads(self) -> Vec<PlacedRead> {
        self.reads
    }

    pub fn add_read(&mut self, read: PlacedRead) {
        self.reads.push(read);
    }

    /// Reads placed by the walk, in layout order.
    pub fn dovetail_reads(&self) -> impl Iterator<Item = &PlacedRead> {
        self.reads.iter().filter(|r| !r.is_contained())
    }

    pub fn num_dovetail(&self) -> usize {
        self.dovetail_reads().count()
    }

    pub fn position_of(&self, id: ReadId) -> Option<usize> {
        self.reads.iter().position(|r| r.id == id)
    }

    pub fn first_backbone_node(&self) -> Option<&PlacedRead> {
        self.reads.iter().find(|r| !r.is_contained())
    }

    pub fn last_backbone_node(&self) -> Option<&PlacedRead> {
        self.reads.iter().rev().find(|r| !r.is_contained())
    }

    /// Largest end coordinate, 0 for an empty unitig.
    pub fn length(&self) -> i64 {
        self.reads.iter().map(|r| r.end()).max().unwrap_or(0).max(0)
    }

    pub fn num_frags(&self) -> usize {
        self.reads.len()
    }

    /// Every placed read counts as randomly sampled; there is no
    /// notion of non-random reads in the input.
    pub fn num_random_frags(&self) -> usize {
        self.num_frags()
    }

    pub fn sum_frag_length(&self) -> i64 {
        self.reads.iter().map(|r| r.len()).sum()
    }

    /// Mean of the spans of the dovetail begin and end coordinates.
    pub fn avg_rho(&self) -> f64 {
        let mut dovetail = self.dovetail_reads();
        let first = match dovetail.next() {
            Some(r) => r,
            None => return 0.0,
        };

        let (mut min_b, mut max_b) = (first.begin(), first.begin());
        let (mut min_e, mut max_e) = (first.end(), first.end());
        for r in dovetail {
            min_b = min_b.min(r.begin());
            max_b = max_b.max(r.begin());
            min_e = min_e.min(r.end());
            max_e = max_e.max(r.end());
        }

        ((max_b - min_b) + (max_e - min_e)) as f64 / 2.0
    }

    pub fn set_local_arrival_rate(&mut self, rate: f64) {
        self.local_arrival_rate = Some(rate);
    }

    pub fn clear_local_arrival_rate(&mut self) {
        self.local_arrival_rate = None;
    }

    /// Dovetail reads per base of rho, unless overridden.
    pub fn local_arrival_rate(&self) -> f64 {
        if let Some(rate) = self.local_arrival_rate {
            return rate;
        }
        let rho = self.avg_rho();
        if rho > 0.0 {
            self.num_dovetail() as f64 / rho
        } else {
            0.0
        }
    }

    /// Signed Poisson log-likelihood ratio of the local arrival rate
    /// against `global_rate`: zero when they agree, growing with the
    /// evidence, positive when the unitig is denser than the genome.
    pub fn cov_stat(&self, global_rate: Option<f64>) -> BogResult<f64> {
        let global = global_rate.ok_or(BogError::ArrivalRateUnset)?;
        let rho = self.avg_rho();
        if rho <= 0.0 || global <= 0.0 {
            return Ok(0.0);
        }

        let local = self.local_arrival_rate();
        let log_term = if local > 0.0 {
            local * rho * (local / global).ln()
        } else {
            0.0
        };
        let llr = log_term - rho * (local - global);

        Ok(if local >= global { llr } else { -llr })
    }

    /// Stable sort by begin coordinate.
    pub fn sort(&mut self) {
        self.reads.sort_by_key(|r| r.begin());
    }

    pub fn shift(&mut self, offset: i64) {
        for r in self.reads.iter_mut() {
            r.position = r.position.shifted(offset);
        }
    }

    /// Flips the layout onto the other strand, keeping its length.
    pub fn reverse_complement(&mut self) {
        let length = self.length();
        for r in self.reads.iter_mut() {
            r.position = r.position.mirrored(length);
            r.orientation = r.orientation.flip();
        }
        self.reads.reverse();
        self.sort();
    }

    /// Recomputes every coordinate from the dovetail path: the first
    /// dovetail read keeps its orientation and starts at 0, each later
    /// one is placed from its predecessor through their best edge.
    /// Where no edge links two neighbours their old gap is kept.
    /// Contained reads move with the dovetail read at the root of
    /// their container chain.
    pub fn compute_fragment_positions<B, R>(&mut self, bog: &B, reads: &R)
    where
        B: BestOverlapProvider,
        R: ReadMetadata,
    {
        let old: Vec<PlacedRead> = self.reads.clone();

        let mut prev: Option<(PlacedRead, PlacedRead)> = None;
        for (ix, read) in old.iter().enumerate() {
            if read.is_contained() {
                continue;
            }
            let len = read.len();

            let placed = match prev {
                None => PlacedRead::dovetail(
                    read.id,
                    read.orientation,
                    SeqInterval::new(0, len),
                ),
                Some((prev_old, prev_new)) => {
                    place_next(bog, reads, &prev_new, read.id, len).unwrap_or_else(|| {
                        log::trace!(
                            "no best edge between {} and {} in unitig {}, keeping gap",
                            prev_new.id,
                            read.id,
                            self.id
                        );
                        let begin =
                            prev_new.begin() + (read.begin() - prev_old.begin());
                        PlacedRead::dovetail(
                            read.id,
                            read.orientation,
                            SeqInterval::new(begin, begin + len),
                        )
                    })
                }
            };

            self.reads[ix] = placed;
            prev = Some((*read, placed));
        }

        let index: FnvHashMap<ReadId, usize> =
            old.iter().enumerate().map(|(ix, r)| (r.id, ix)).collect();

        for (ix, read) in old.iter().enumerate() {
            if !read.is_contained() {
                continue;
            }
            if let Some(root) = root_container(&old, &index, ix) {
                let delta = self.reads[root].begin() - old[root].begin();
                self.reads[ix].position = read.position.shifted(delta);
            }
        }
    }
}

/// Index of the dovetail read at the top of the container chain of
/// the read at `ix`, if the whole chain is in this layout.
fn root_container(
    reads: &[PlacedRead],
    index: &FnvHashMap<ReadId, usize>,
    ix: usize,
) -> Option<usize> {
    let mut current = ix;
    for _ in 0..reads.len() {
        match reads[current].container {
            None => return Some(current),
            Some(c) => current = *index.get(&c)?,
        }
    }
    None
}
