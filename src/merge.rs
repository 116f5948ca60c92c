use fnv::FnvHashSet;

use crate::best_overlap::{BestEdge, BestOverlapProvider};
use crate::error::{BogError, BogResult};
use crate::fragment::{FragmentEnd, ReadId, UnitigId};
use crate::placement::Placement;
use crate::reads::ReadMetadata;
use crate::unitig::{clamp_hop, PlacedRead, Unitig};
use crate::unitig_graph::UnitigGraph;

/// Tally of where the best edges of dovetail reads lead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BestEdgeCounts {
    /// Into the same unitig, not returned.
    pub one_way_best: usize,
    /// Into the same unitig, returned.
    pub dovetail: usize,
    /// Into another unitig.
    pub neither: usize,
    pub contained: usize,
}

impl std::ops::AddAssign for BestEdgeCounts {
    fn add_assign(&mut self, other: Self) {
        self.one_way_best += other.one_way_best;
        self.dovetail += other.dovetail;
        self.neither += other.neither;
        self.contained += other.contained;
    }
}

impl std::fmt::Display for BestEdgeCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} dovetail, {} one-way, {} neither, {} contained",
            self.dovetail, self.one_way_best, self.neither, self.contained
        )
    }
}

/// A unitig whose end can be attached at the tail of another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joiner {
    /// Last backbone read of the growing unitig.
    pub tail: PlacedRead,
    /// Best edge out of `tail`.
    pub edge: BestEdge,
    /// The unitig `edge` leads into.
    pub unitig: UnitigId,
    /// Whether `unitig` is entered at its last read and has to be
    /// reverse complemented first.
    pub flip: bool,
}

impl<'a, B, R> UnitigGraph<'a, B, R>
where
    B: BestOverlapProvider,
    R: ReadMetadata,
{
    /// The unitig that can be attached at the tail of `tig`: the best
    /// edge out of its last backbone read must be mutual, land on a
    /// read not yet joined in this pass, and enter another unitig
    /// through one of its two ends.
    pub fn next_joiner(
        &self,
        tig: &Unitig,
        visited: &FnvHashSet<ReadId>,
    ) -> Option<Joiner> {
        let tail = *tig.last_backbone_node()?;
        let exit = FragmentEnd::new(tail.id, tail.tail_end());
        let edge = self.bog.best_edge(exit.id, exit.end)?;

        if self.bog.is_contained(edge.partner) || !self.bog.is_mutual(exit) {
            return None;
        }
        if visited.contains(&edge.partner) {
            log::trace!("read {} was already joined in this pass", edge.partner);
            return None;
        }

        let other_id = match self.registry.get(edge.partner).ok()? {
            Placement::Dovetail(t) => t,
            _ => return None,
        };
        if other_id == tig.id() {
            log::debug!("unitig {} loops back to itself, not merged", tig.id());
            return None;
        }

        let other = self.unitig(other_id)?;
        let first = other.first_backbone_node()?;
        let last = other.last_backbone_node()?;

        let flip = if first.id == edge.partner && first.head_end() == edge.partner_end {
            false
        } else if last.id == edge.partner && last.tail_end() == edge.partner_end {
            true
        } else {
            log::trace!(
                "edge {} -> {} enters unitig {} away from its ends",
                exit,
                edge.target(),
                other_id
            );
            return None;
        };

        Some(Joiner {
            tail,
            edge,
            unitig: other_id,
            flip,
        })
    }

    /// Appends the unitig named by `joiner` to `tig`, placing the
    /// partner read `a_hang` bases after the tail read, or at the
    /// clamped overlap when the hangs are impossible.
    fn join(
        &mut self,
        tig: &mut Unitig,
        joiner: Joiner,
        visited: &mut FnvHashSet<ReadId>,
    ) -> BogResult<()> {
        let mut other = match self
            .unitigs
            .get_mut(joiner.unitig as usize)
            .and_then(Option::take)
        {
            Some(t) => t,
            None => return Ok(()),
        };

        if joiner.flip {
            other.reverse_complement();
        }

        let partner = match other.position_of(joiner.edge.partner) {
            Some(ix) => other.reads()[ix],
            None => {
                self.unitigs[joiner.unitig as usize] = Some(other);
                return Err(BogError::UnknownRead(joiner.edge.partner));
            }
        };
        let begin = clamp_hop(
            self.reads,
            &joiner.tail,
            partner.len(),
            joiner.tail.begin() + joiner.edge.a_hang as i64,
            joiner.tail.id,
            &joiner.edge,
        );
        let offset = begin - partner.begin();
        other.shift(offset);

        for r in other.reads() {
            self.registry.reassign(r.id, tig.id())?;
        }
        visited.insert(joiner.tail.id);
        visited.insert(joiner.edge.partner);

        log::debug!(
            "merged unitig {} into {} at {}{}",
            joiner.unitig,
            tig.id(),
            offset,
            if joiner.flip { ", flipped" } else { "" }
        );

        tig.reads_mut().extend(other.into_reads());
        tig.sort();
        tig.clear_local_arrival_rate();
        Ok(())
    }

    fn grow(
        &mut self,
        tig: &mut Unitig,
        visited: &mut FnvHashSet<ReadId>,
    ) -> BogResult<usize> {
        let mut joined = 0;
        for _ in 0..2 {
            while let Some(joiner) = self.next_joiner(tig, visited) {
                self.join(tig, joiner, visited)?;
                joined += 1;
            }
            tig.reverse_complement();
        }
        Ok(joined)
    }

    /// Grows unitig `id` from its tail, then from its head. Returns the
    /// number of unitigs absorbed.
    pub fn merge_unitig(
        &mut self,
        id: UnitigId,
        visited: &mut FnvHashSet<ReadId>,
    ) -> BogResult<usize> {
        let mut tig = match self.unitigs.get_mut(id as usize).and_then(Option::take) {
            Some(t) => t,
            None => return Ok(0),
        };
        let joined = self.grow(&mut tig, visited);
        self.unitigs[id as usize] = Some(tig);
        joined
    }

    /// One merge pass over every live unitig. Returns the number of
    /// unitigs absorbed into others.
    pub fn merge_all_unitigs(&mut self) -> BogResult<usize> {
        let mut visited = FnvHashSet::default();
        let mut merged = 0;

        for id in self.live_ids() {
            merged += self.merge_unitig(id, &mut visited)?;
        }

        log::info!(
            "merged {} unitigs, {} left",
            merged,
            self.num_unitigs()
        );
        Ok(merged)
    }

    /// Classifies the best edge of both ends of every dovetail read.
    pub fn count_internal_best_edges(&self) -> BestEdgeCounts {
        let mut total = BestEdgeCounts::default();

        for tig in self.unitigs() {
            let mut counts = BestEdgeCounts::default();
            for read in tig.dovetail_reads() {
                for &end in [read.head_end(), read.tail_end()].iter() {
                    let edge = match self.bog.best_edge(read.id, end) {
                        Some(e) => e,
                        None => continue,
                    };
                    if self.bog.is_contained(edge.partner) {
                        counts.contained += 1;
                    } else if self.registry.unitig_of(edge.partner) == Some(tig.id()) {
                        if self.bog.is_mutual(FragmentEnd::new(read.id, end)) {
                            counts.dovetail += 1;
                        } else {
                            counts.one_way_best += 1;
                        }
                    } else {
                        counts.neither += 1;
                    }
                }
            }
            log::trace!("unitig {}: {}", tig.id(), counts);
            total += counts;
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_overlap::{BestContainment, BestOverlapGraph};
    use crate::breakpoints::BreakPoint;
    use crate::chunk::{ChunkGraph, ChunkWalker};
    use crate::config::UnitigConfig;
    use crate::fragment::{Orientation, ReadEnd, SeqInterval};
    use crate::reads::ReadInfo;
    use crate::unitig_graph::tests::{begins, discordant_chains, fe};
    use Orientation::*;
    use ReadEnd::*;

    /// Refuses to walk out of the listed read ends.
    struct BlockingWalker<'a> {
        inner: ChunkGraph<'a, BestOverlapGraph>,
        blocked: Vec<FragmentEnd>,
    }

    impl<'a> ChunkWalker for BlockingWalker<'a> {
        fn next_in_chunk(&self, id: ReadId, end: ReadEnd) -> Option<FragmentEnd> {
            if self.blocked.contains(&FragmentEnd::new(id, end)) {
                None
            } else {
                self.inner.next_in_chunk(id, end)
            }
        }
    }

    fn orientations(tig: &Unitig) -> Vec<Orientation> {
        tig.reads().iter().map(|r| r.orientation).collect()
    }

    #[test]
    fn full_pipeline_rejoins_the_split() {
        let (bog, info) = discordant_chains();
        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        graph.run().unwrap();

        assert_eq!(2, graph.num_unitigs());

        let joined = graph.unitig_of_read(9).unwrap();
        assert_eq!(
            vec![(6, 0), (7, 800), (8, 1600), (9, 2400), (4, 3200), (5, 4000)],
            begins(joined)
        );
        assert_eq!(5000, joined.length());

        let rest = graph.unitig_of_read(1).unwrap();
        assert_eq!(vec![(1, 0), (2, 800), (3, 1600)], begins(rest));
        assert_ne!(rest.id(), joined.id());
    }

    #[test]
    fn split_then_merge_round_trip() {
        let mut bog = BestOverlapGraph::new(5);
        for a in 1..5 {
            bog.set_mutual_edge(fe(a, ThreePrime), fe(a + 1, FivePrime), 800, 800);
        }
        let info = ReadInfo::from_lengths(&[1000; 5]);

        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        graph.build().unwrap();
        let original = graph.unitig(1).unwrap().clone();

        let cut = BreakPoint {
            frag_number: 3,
            position: SeqInterval::new(2400, 3400),
            end: fe(4, FivePrime),
            at_head: true,
            partner: fe(3, ThreePrime),
            in_size: 0,
            in_frags: 0,
        };
        let pieces = graph.break_unitig_at(1, &[cut]).unwrap();
        assert_eq!(2, pieces.len());
        assert_eq!(2, graph.num_unitigs());

        assert_eq!(1, graph.merge_all_unitigs().unwrap());
        assert_eq!(1, graph.num_unitigs());

        let merged = graph.unitig_of_read(1).unwrap();
        assert_eq!(begins(&original), begins(merged));
        assert_eq!(orientations(&original), orientations(merged));
        graph.check_placement().unwrap();
    }

    #[test]
    fn joining_through_the_last_read_flips_it() {
        let mut bog = BestOverlapGraph::new(4);
        bog.set_mutual_edge(fe(1, ThreePrime), fe(2, FivePrime), 800, 800);
        bog.set_mutual_edge(fe(3, ThreePrime), fe(4, FivePrime), 800, 800);
        bog.set_mutual_edge(fe(2, ThreePrime), fe(4, ThreePrime), 700, 700);
        let info = ReadInfo::from_lengths(&[1000; 4]);

        let walker = BlockingWalker {
            inner: ChunkGraph::new(&bog),
            blocked: vec![fe(2, ThreePrime), fe(4, ThreePrime)],
        };

        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        graph.build_with(&walker).unwrap();
        assert_eq!(2, graph.num_unitigs());

        let mut visited = FnvHashSet::default();
        let joiner = graph
            .next_joiner(graph.unitig(1).unwrap(), &visited)
            .unwrap();
        assert_eq!(2, joiner.unitig);
        assert!(joiner.flip);

        assert_eq!(1, graph.merge_unitig(1, &mut visited).unwrap());
        assert!(graph.unitig(2).is_none());

        let tig = graph.unitig(1).unwrap();
        assert_eq!(vec![(1, 0), (2, 800), (4, 1500), (3, 2300)], begins(tig));
        assert_eq!(vec![Forward, Forward, Backward, Backward], orientations(tig));
        assert_eq!(3300, tig.length());
        assert!(visited.contains(&2) && visited.contains(&4));
        graph.check_placement().unwrap();
    }

    #[test]
    fn joins_clamp_impossible_hangs() {
        let mut bog = BestOverlapGraph::new(2);
        bog.set_mutual_edge(fe(1, ThreePrime), fe(2, FivePrime), 1500, 1500);
        let info = ReadInfo::from_lengths(&[1000; 2]);

        let walker = BlockingWalker {
            inner: ChunkGraph::new(&bog),
            blocked: vec![fe(1, ThreePrime), fe(2, FivePrime)],
        };

        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        graph.build_with(&walker).unwrap();
        assert_eq!(2, graph.num_unitigs());

        assert_eq!(1, graph.merge_all_unitigs().unwrap());
        let tig = graph.unitig(1).unwrap();
        assert_eq!(vec![(1, 0), (2, 1000)], begins(tig));
        assert_eq!(2000, tig.length());
    }

    #[test]
    fn self_loops_are_left_alone() {
        let mut bog = BestOverlapGraph::new(3);
        bog.set_mutual_edge(fe(1, ThreePrime), fe(2, FivePrime), 500, 500);
        bog.set_mutual_edge(fe(2, ThreePrime), fe(3, FivePrime), 500, 500);
        bog.set_mutual_edge(fe(3, ThreePrime), fe(1, FivePrime), 500, 500);
        let info = ReadInfo::from_lengths(&[1000; 3]);

        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        graph.build().unwrap();
        let before = graph.unitig(1).unwrap().clone();

        assert_eq!(0, graph.merge_all_unitigs().unwrap());
        assert_eq!(&before, graph.unitig(1).unwrap());
    }

    #[test]
    fn one_way_edges_do_not_merge() {
        let (bog, info) = discordant_chains();
        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        graph.build().unwrap();
        graph.break_unitigs().unwrap();

        let left = graph.unitig_of_read(3).unwrap();
        assert_eq!(None, graph.next_joiner(left, &FnvHashSet::default()));
    }

    #[test]
    fn internal_edge_classes() {
        let (mut bog, mut info) = discordant_chains();
        bog.set_containment(
            10,
            BestContainment {
                container: 5,
                a_hang: 100,
                b_hang: -600,
                same_orientation: true,
            },
        );
        bog.set_best_edge(
            fe(1, FivePrime),
            BestEdge {
                partner: 10,
                partner_end: FivePrime,
                a_hang: -100,
                b_hang: -100,
            },
        );
        info.set_read(10, 300, 0);

        let mut graph = UnitigGraph::new(&bog, &info, UnitigConfig::default()).unwrap();
        graph.build().unwrap();

        let counts = graph.count_internal_best_edges();
        assert_eq!(
            BestEdgeCounts {
                one_way_best: 1,
                dovetail: 12,
                neither: 2,
                contained: 1,
            },
            counts
        );

        let mut sum = BestEdgeCounts::default();
        sum += counts;
        sum += counts;
        assert_eq!(24, sum.dovetail);
    }
}
