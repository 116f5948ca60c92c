use crate::best_overlap::BestOverlapProvider;
use crate::fragment::{FragmentEnd, ReadEnd, ReadId};

/// Decides which read end a unitig walk visits next. Hops need not be
/// mutual; breaking later removes the joins the far read disagrees with.
pub trait ChunkWalker {
    /// Given the read end a walk is leaving through, the read end it
    /// enters next, if any.
    fn next_in_chunk(&self, id: ReadId, end: ReadEnd) -> Option<FragmentEnd>;

    /// Number of reads reachable from `start` leaving through `end`,
    /// `start` included. Stops when the walk returns to a read it has
    /// already seen.
    fn chunk_length(&self, start: ReadId, end: ReadEnd) -> usize {
        let mut seen = fnv::FnvHashSet::default();
        seen.insert(start);

        let mut current = FragmentEnd::new(start, end);
        while let Some(next) = self.next_in_chunk(current.id, current.end) {
            if !seen.insert(next.id) {
                break;
            }
            current = FragmentEnd::new(next.id, next.end.opposite());
        }
        seen.len()
    }
}

/// Walks best edges, stopping in front of contained reads. One-way
/// best edges are followed; whether they belong in the layout is
/// decided later, when unitigs are broken.
pub struct ChunkGraph<'a, B> {
    bog: &'a B,
}

impl<'a, B: BestOverlapProvider> ChunkGraph<'a, B> {
    pub fn new(bog: &'a B) -> Self {
        ChunkGraph { bog }
    }
}

impl<'a, B: BestOverlapProvider> ChunkWalker for ChunkGraph<'a, B> {
    fn next_in_chunk(&self, id: ReadId, end: ReadEnd) -> Option<FragmentEnd> {
        let edge = self.bog.best_edge(id, end)?;
        if self.bog.is_contained(edge.partner) {
            return None;
        }
        Some(edge.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_overlap::{BestContainment, BestOverlapGraph};
    use ReadEnd::*;

    fn fe(id: ReadId, end: ReadEnd) -> FragmentEnd {
        FragmentEnd::new(id, end)
    }

    #[test]
    fn walk_stops_at_contained_reads() {
        let mut bog = BestOverlapGraph::new(4);
        bog.set_mutual_edge(fe(1, ThreePrime), fe(2, FivePrime), 800, 800);
        bog.set_mutual_edge(fe(2, ThreePrime), fe(3, ThreePrime), 700, 700);
        bog.set_containment(
            3,
            BestContainment {
                container: 4,
                a_hang: 0,
                b_hang: 0,
                same_orientation: true,
            },
        );

        let chunks = ChunkGraph::new(&bog);
        assert_eq!(Some(fe(2, FivePrime)), chunks.next_in_chunk(1, ThreePrime));
        assert_eq!(None, chunks.next_in_chunk(2, ThreePrime));
        assert_eq!(None, chunks.next_in_chunk(1, FivePrime));
        assert_eq!(2, chunks.chunk_length(1, ThreePrime));
    }

    #[test]
    fn chunk_length_survives_cycles() {
        let mut bog = BestOverlapGraph::new(3);
        bog.set_mutual_edge(fe(1, ThreePrime), fe(2, FivePrime), 500, 500);
        bog.set_mutual_edge(fe(2, ThreePrime), fe(3, FivePrime), 500, 500);
        bog.set_mutual_edge(fe(3, ThreePrime), fe(1, FivePrime), 500, 500);

        let chunks = ChunkGraph::new(&bog);
        assert_eq!(3, chunks.chunk_length(1, ThreePrime));
        assert_eq!(3, chunks.chunk_length(2, FivePrime));
    }
}
