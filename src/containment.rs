use fnv::{FnvHashMap, FnvHashSet};

use crate::best_overlap::{BestContainment, BestOverlapProvider};
use crate::error::{BogError, BogResult};
use crate::fragment::{Orientation, ReadId, SeqInterval};
use crate::placement::PlacementRegistry;
use crate::reads::ReadMetadata;
use crate::unitig::{PlacedRead, Unitig};

/// The containment relation turned around: for each container, the
/// reads it contains, in ascending id order.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ContainerMap {
    contains: FnvHashMap<ReadId, Vec<ReadId>>,
    num_contained: usize,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnChain,
    Done,
}

impl ContainerMap {
    /// Inverts the containment relation of reads `1..=num_reads`.
    /// Fails if following container links from any read leads back
    /// to a read already on the chain.
    pub fn build<B: BestOverlapProvider>(
        bog: &B,
        num_reads: u32,
    ) -> BogResult<Self> {
        let mut contains: FnvHashMap<ReadId, Vec<ReadId>> = FnvHashMap::default();
        let mut num_contained = 0;

        for id in 1..=num_reads {
            if let Some(c) = bog.container_of(id) {
                contains.entry(c.container).or_default().push(id);
                num_contained += 1;
            }
        }

        let mut marks = vec![Mark::Unvisited; num_reads as usize + 1];
        let mut chain = Vec::new();

        for id in 1..=num_reads {
            let mut current = id;
            loop {
                let mark = match marks.get(current as usize) {
                    Some(m) => *m,
                    // containers beyond the read range end the chain
                    None => break,
                };
                match mark {
                    Mark::Done => break,
                    Mark::OnChain => {
                        return Err(BogError::ContainmentCycle {
                            read: id,
                            container: current,
                        })
                    }
                    Mark::Unvisited => {
                        marks[current as usize] = Mark::OnChain;
                        chain.push(current);
                        match bog.container_of(current) {
                            Some(c) => current = c.container,
                            None => break,
                        }
                    }
                }
            }
            for r in chain.drain(..) {
                marks[r as usize] = Mark::Done;
            }
        }

        Ok(ContainerMap {
            contains,
            num_contained,
        })
    }

    pub fn contained_in(&self, container: ReadId) -> &[ReadId] {
        self.contains
            .get(&container)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn num_contained(&self) -> usize {
        self.num_contained
    }

    pub fn is_empty(&self) -> bool {
        self.num_contained == 0
    }
}

/// Where a read of length `len` lands inside `container`.
pub fn place_in_container(
    container: &PlacedRead,
    id: ReadId,
    cont: &BestContainment,
    len: i64,
) -> PlacedRead {
    let a_hang = cont.a_hang as i64;
    let begin = match container.orientation {
        Orientation::Forward => container.begin() + a_hang,
        Orientation::Backward => container.end() - a_hang - len,
    };
    let orientation = if cont.same_orientation {
        container.orientation
    } else {
        container.orientation.flip()
    };
    PlacedRead::contained(
        id,
        orientation,
        SeqInterval::new(begin, begin + len),
        container.id,
    )
}

/// Adds every read transitively contained in a read of `tig`, depth
/// first. Reads already in `tig` are left where they are. Returns the
/// number of reads added.
pub fn place_contains<B, R>(
    tig: &mut Unitig,
    registry: &mut PlacementRegistry,
    containers: &ContainerMap,
    bog: &B,
    reads: &R,
) -> BogResult<usize>
where
    B: BestOverlapProvider,
    R: ReadMetadata,
{
    if containers.is_empty() {
        return Ok(0);
    }

    let mut index: FnvHashMap<ReadId, usize> = tig
        .reads()
        .iter()
        .enumerate()
        .map(|(ix, r)| (r.id, ix))
        .collect();
    let present: FnvHashSet<ReadId> = index.keys().copied().collect();
    let mut visited: FnvHashSet<ReadId> = present.clone();

    let mut stack: Vec<(ReadId, usize)> =
        tig.reads().iter().rev().map(|r| (r.id, 0)).collect();
    let max_depth = containers.num_contained();
    let mut added = 0;

    while let Some((container_id, depth)) = stack.pop() {
        for &child in containers.contained_in(container_id).iter().rev() {
            if present.contains(&child) {
                continue;
            }
            if !visited.insert(child) || depth >= max_depth {
                return Err(BogError::ContainmentCycle {
                    read: child,
                    container: container_id,
                });
            }

            let cont = match bog.container_of(child) {
                Some(c) => c,
                None => continue,
            };
            let len = reads.read_length(child) as i64;
            if len == 0 {
                log::debug!("contained read {} has no length, not placed", child);
                continue;
            }

            let container = match index.get(&container_id) {
                Some(&ix) => tig.reads()[ix],
                None => {
                    return Err(BogError::MissingContainer {
                        read: child,
                        container: container_id,
                    })
                }
            };

            registry.place_contained(child, tig.id())?;
            index.insert(child, tig.reads().len());
            tig.add_read(place_in_container(&container, child, &cont, len));
            stack.push((child, depth + 1));
            added += 1;
        }
    }

    log::trace!("placed {} contained reads in unitig {}", added, tig.id());
    Ok(added)
}

/// Strips the contained reads from `tig`, recomputes the dovetail
/// coordinates, and places the contained reads again.
pub fn recompute_fragment_positions<B, R>(
    tig: &mut Unitig,
    registry: &mut PlacementRegistry,
    containers: &ContainerMap,
    bog: &B,
    reads: &R,
) -> BogResult<()>
where
    B: BestOverlapProvider,
    R: ReadMetadata,
{
    let mut released = Vec::new();
    tig.reads_mut().retain(|r| {
        if r.is_contained() {
            released.push(r.id);
            false
        } else {
            true
        }
    });
    for id in released {
        registry.release(id)?;
    }

    tig.sort();
    tig.compute_fragment_positions(bog, reads);
    place_contains(tig, registry, containers, bog, reads)?;
    tig.sort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_overlap::BestOverlapGraph;
    use crate::fragment::{FragmentEnd, ReadEnd};
    use crate::reads::ReadInfo;
    use Orientation::*;

    fn contained(container: ReadId, a_hang: i32, same: bool) -> BestContainment {
        BestContainment {
            container,
            a_hang,
            b_hang: 0,
            same_orientation: same,
        }
    }

    #[test]
    fn container_map_inverts_relation() {
        let mut bog = BestOverlapGraph::new(5);
        bog.set_containment(3, contained(1, 100, true));
        bog.set_containment(2, contained(1, 10, true));
        bog.set_containment(4, contained(3, 10, false));

        let map = ContainerMap::build(&bog, 5).unwrap();
        assert_eq!(&[2, 3], map.contained_in(1));
        assert_eq!(&[4], map.contained_in(3));
        assert!(map.contained_in(5).is_empty());
        assert_eq!(3, map.num_contained());
    }

    #[test]
    fn containment_cycles_are_fatal() {
        let mut bog = BestOverlapGraph::new(4);
        bog.set_containment(2, contained(3, 0, true));
        bog.set_containment(3, contained(4, 0, true));
        bog.set_containment(4, contained(2, 0, true));

        match ContainerMap::build(&bog, 4) {
            Err(BogError::ContainmentCycle { read, container }) => {
                assert_eq!(2, read);
                assert_eq!(2, container);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }

        let mut bog = BestOverlapGraph::new(1);
        bog.set_containment(1, contained(1, 0, true));
        assert!(ContainerMap::build(&bog, 1).is_err());
    }

    #[test]
    fn contained_read_inside_forward_container() {
        let mut bog = BestOverlapGraph::new(4);
        bog.set_mutual_edge(
            FragmentEnd::new(1, ReadEnd::ThreePrime),
            FragmentEnd::new(2, ReadEnd::FivePrime),
            800,
            0,
        );
        bog.set_containment(4, contained(1, 200, true));
        let info = ReadInfo::from_lengths(&[1000, 1000, 1000, 300]);
        let map = ContainerMap::build(&bog, 4).unwrap();
        let mut registry = PlacementRegistry::new(4);

        let mut tig = Unitig::with_reads(
            1,
            vec![
                PlacedRead::dovetail(1, Forward, SeqInterval::new(0, 1000)),
                PlacedRead::dovetail(2, Forward, SeqInterval::new(800, 1800)),
            ],
        );
        registry.place_dovetail(1, 1).unwrap();
        registry.place_dovetail(2, 1).unwrap();

        let added = place_contains(&mut tig, &mut registry, &map, &bog, &info)
            .unwrap();
        assert_eq!(1, added);

        let d = tig.reads()[tig.position_of(4).unwrap()];
        assert_eq!(SeqInterval::new(200, 500), d.position);
        assert_eq!(Some(1), d.container);
        assert_eq!(SeqInterval::new(0, 1000), tig.reads()[0].position);
        assert_eq!(SeqInterval::new(800, 1800), tig.reads()[1].position);
        assert_eq!(Some(1), registry.unitig_of(4));

        // nothing new the second time around
        let added = place_contains(&mut tig, &mut registry, &map, &bog, &info)
            .unwrap();
        assert_eq!(0, added);
    }

    #[test]
    fn nested_containment_in_reversed_container() {
        let mut bog = BestOverlapGraph::new(3);
        bog.set_containment(2, contained(1, 100, false));
        bog.set_containment(3, contained(2, 50, true));
        let info = ReadInfo::from_lengths(&[1000, 500, 200]);
        let map = ContainerMap::build(&bog, 3).unwrap();
        let mut registry = PlacementRegistry::new(3);

        let mut tig = Unitig::with_reads(
            1,
            vec![PlacedRead::dovetail(1, Backward, SeqInterval::new(0, 1000))],
        );
        registry.place_dovetail(1, 1).unwrap();
        place_contains(&mut tig, &mut registry, &map, &bog, &info).unwrap();
        tig.sort();

        // 2 sits 100 bases from the 5' end of 1, which is on the right
        let two = tig.reads()[tig.position_of(2).unwrap()];
        assert_eq!(SeqInterval::new(400, 900), two.position);
        assert_eq!(Forward, two.orientation);

        let three = tig.reads()[tig.position_of(3).unwrap()];
        assert_eq!(SeqInterval::new(450, 650), three.position);
        assert_eq!(Forward, three.orientation);
        assert_eq!(Some(2), three.container);
    }

    #[test]
    fn recompute_replaces_contained_reads() {
        let mut bog = BestOverlapGraph::new(3);
        bog.set_mutual_edge(
            FragmentEnd::new(1, ReadEnd::ThreePrime),
            FragmentEnd::new(2, ReadEnd::FivePrime),
            800,
            800,
        );
        bog.set_containment(3, contained(2, 100, true));
        let info = ReadInfo::from_lengths(&[1000, 1000, 300]);
        let map = ContainerMap::build(&bog, 3).unwrap();
        let mut registry = PlacementRegistry::new(3);

        let mut tig = Unitig::with_reads(
            4,
            vec![
                PlacedRead::dovetail(1, Forward, SeqInterval::new(500, 1500)),
                PlacedRead::dovetail(2, Forward, SeqInterval::new(1300, 2300)),
                PlacedRead::contained(3, Forward, SeqInterval::new(1400, 1700), 2),
            ],
        );
        registry.place_dovetail(1, 4).unwrap();
        registry.place_dovetail(2, 4).unwrap();
        registry.place_contained(3, 4).unwrap();

        recompute_fragment_positions(&mut tig, &mut registry, &map, &bog, &info)
            .unwrap();

        let positions: Vec<_> = tig.reads().iter().map(|r| r.position).collect();
        assert_eq!(
            vec![
                SeqInterval::new(0, 1000),
                SeqInterval::new(800, 1800),
                SeqInterval::new(900, 1200),
            ],
            positions
        );
        assert_eq!(Some(4), registry.unitig_of(3));
    }
}
