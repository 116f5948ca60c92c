#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::fragment::{FragmentEnd, ReadEnd, ReadId};
use crate::parser::OverlapRecords;

/// The best overlap leaving a read end. `a_hang` is the offset of the
/// partner's start from this read's start, with this read laid out so
/// the end the edge leaves from faces right; `b_hang` is the offset of
/// the partner's end from this read's end in the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct BestEdge {
    pub partner: ReadId,
    pub partner_end: ReadEnd,
    pub a_hang: i32,
    pub b_hang: i32,
}

impl BestEdge {
    #[inline]
    pub fn target(&self) -> FragmentEnd {
        FragmentEnd::new(self.partner, self.partner_end)
    }
}

/// The best container of a contained read. `a_hang` is the offset of
/// the contained read's start from the container's start, `b_hang`
/// the offset of its end from the container's end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct BestContainment {
    pub container: ReadId,
    pub a_hang: i32,
    pub b_hang: i32,
    pub same_orientation: bool,
}

/// Read-only access to the best-overlap and containment relations.
pub trait BestOverlapProvider {
    fn best_edge(&self, id: ReadId, end: ReadEnd) -> Option<BestEdge>;

    fn container_of(&self, id: ReadId) -> Option<BestContainment>;

    /// The largest read id named by any edge or containment, 0 if
    /// there are none.
    fn max_read_id(&self) -> ReadId;

    fn is_contained(&self, id: ReadId) -> bool {
        self.container_of(id).is_some()
    }

    /// True if the best edge leaving `from` lands on a read end whose
    /// own best edge points straight back at `from`.
    fn is_mutual(&self, from: FragmentEnd) -> bool {
        self.best_edge(from.id, from.end)
            .and_then(|e| self.best_edge(e.partner, e.partner_end))
            .map_or(false, |back| back.target() == from)
    }
}

/// In-memory best-overlap graph, indexed by read id.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct BestOverlapGraph {
    edges: Vec<[Option<BestEdge>; 2]>,
    containments: Vec<Option<BestContainment>>,
}

impl BestOverlapGraph {
    pub fn new(num_reads: u32) -> Self {
        let size = num_reads as usize + 1;
        BestOverlapGraph {
            edges: vec![[None, None]; size],
            containments: vec![None; size],
        }
    }

    pub fn from_records(records: &OverlapRecords, num_reads: u32) -> Self {
        let mut bog = BestOverlapGraph::new(num_reads);
        for e in records.edges.iter() {
            bog.set_best_edge(e.from, e.edge);
        }
        for c in records.containments.iter() {
            bog.set_containment(c.id, c.containment);
        }
        bog
    }

    pub fn num_reads(&self) -> u32 {
        self.edges.len().saturating_sub(1) as u32
    }

    fn ensure(&mut self, id: ReadId) {
        let needed = id as usize + 1;
        if self.edges.len() < needed {
            self.edges.resize(needed, [None, None]);
            self.containments.resize(needed, None);
        }
    }

    pub fn set_best_edge(&mut self, from: FragmentEnd, edge: BestEdge) {
        self.ensure(from.id.max(edge.partner));
        self.edges[from.id as usize][from.end.index()] = Some(edge);
    }

    /// Sets the edge in both directions. The hangs of the reverse
    /// edge are the forward hangs swapped.
    pub fn set_mutual_edge(
        &mut self,
        from: FragmentEnd,
        to: FragmentEnd,
        a_hang: i32,
        b_hang: i32,
    ) {
        self.set_best_edge(
            from,
            BestEdge {
                partner: to.id,
                partner_end: to.end,
                a_hang,
                b_hang,
            },
        );
        self.set_best_edge(
            to,
            BestEdge {
                partner: from.id,
                partner_end: from.end,
                a_hang: b_hang,
                b_hang: a_hang,
            },
        );
    }

    pub fn set_containment(&mut self, id: ReadId, cont: BestContainment) {
        self.ensure(id.max(cont.container));
        self.containments[id as usize] = Some(cont);
    }
}

impl BestOverlapProvider for BestOverlapGraph {
    fn best_edge(&self, id: ReadId, end: ReadEnd) -> Option<BestEdge> {
        self.edges.get(id as usize).and_then(|e| e[end.index()])
    }

    fn container_of(&self, id: ReadId) -> Option<BestContainment> {
        self.containments.get(id as usize).copied().flatten()
    }

    fn max_read_id(&self) -> ReadId {
        let edges = self.edges.iter().enumerate().flat_map(|(ix, ends)| {
            ends.iter()
                .flatten()
                .map(move |e| (ix as ReadId).max(e.partner))
        });
        let conts = self
            .containments
            .iter()
            .enumerate()
            .filter_map(|(ix, c)| c.map(|c| (ix as ReadId).max(c.container)));
        edges.chain(conts).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReadEnd::*;

    #[test]
    fn mutual_and_one_way_edges() {
        let mut bog = BestOverlapGraph::new(3);
        bog.set_mutual_edge(
            FragmentEnd::new(1, ThreePrime),
            FragmentEnd::new(2, FivePrime),
            800,
            800,
        );
        bog.set_best_edge(
            FragmentEnd::new(2, ThreePrime),
            BestEdge {
                partner: 3,
                partner_end: FivePrime,
                a_hang: 700,
                b_hang: 700,
            },
        );

        assert!(bog.is_mutual(FragmentEnd::new(1, ThreePrime)));
        assert!(bog.is_mutual(FragmentEnd::new(2, FivePrime)));
        assert!(!bog.is_mutual(FragmentEnd::new(2, ThreePrime)));
        assert!(!bog.is_mutual(FragmentEnd::new(3, FivePrime)));
        assert_eq!(None, bog.best_edge(9, FivePrime));
    }

    #[test]
    fn graph_grows_to_fit_ids() {
        let mut bog = BestOverlapGraph::new(1);
        bog.set_containment(
            4,
            BestContainment {
                container: 1,
                a_hang: 10,
                b_hang: -10,
                same_orientation: true,
            },
        );
        assert_eq!(4, bog.num_reads());
        assert!(bog.is_contained(4));
        assert!(!bog.is_contained(1));
        assert_eq!(4, bog.max_read_id());

        // table size alone does not count
        assert_eq!(0, BestOverlapGraph::new(7).max_read_id());
    }
}
