use fnv::FnvHashSet;

use crate::best_overlap::BestOverlapProvider;
use crate::chunk::{ChunkGraph, ChunkWalker};
use crate::config::UnitigConfig;
use crate::containment::{place_contains, ContainerMap};
use crate::error::{BogError, BogResult};
use crate::fragment::{Orientation, ReadEnd, ReadId, SeqInterval, UnitigId};
use crate::placement::{Placement, PlacementRegistry};
use crate::reads::ReadMetadata;
use crate::unitig::{place_next, PlacedRead, Unitig};

/// Owns every unitig of one dataset along with the placement
/// registry and the global arrival rate they share. Unitig ids index
/// `unitigs`; a slot is emptied when its unitig is split or merged
/// away, and slot 0 is never used.
pub struct UnitigGraph<'a, B, R> {
    pub(crate) bog: &'a B,
    pub(crate) reads: &'a R,
    pub(crate) config: UnitigConfig,
    pub(crate) containers: ContainerMap,
    pub(crate) registry: PlacementRegistry,
    pub(crate) unitigs: Vec<Option<Unitig>>,
    global_arrival_rate: Option<f64>,
}

impl<'a, B, R> UnitigGraph<'a, B, R>
where
    B: BestOverlapProvider,
    R: ReadMetadata,
{
    /// Sizes the placement registry to the reads `reads` knows about
    /// and inverts the containment relation over them. Fails if `bog`
    /// names a read beyond that range.
    pub fn new(bog: &'a B, reads: &'a R, config: UnitigConfig) -> BogResult<Self> {
        let num_reads = reads.num_reads();
        let max_id = bog.max_read_id();
        if max_id > num_reads {
            return Err(BogError::RegistryOverflow {
                read: max_id,
                capacity: num_reads,
            });
        }
        let containers = ContainerMap::build(bog, num_reads)?;
        log::debug!(
            "{} reads, {} of them contained",
            num_reads,
            containers.num_contained()
        );

        Ok(UnitigGraph {
            bog,
            reads,
            config,
            containers,
            registry: PlacementRegistry::new(num_reads),
            unitigs: vec![None],
            global_arrival_rate: None,
        })
    }

    pub fn config(&self) -> &UnitigConfig {
        &self.config
    }

    pub fn registry(&self) -> &PlacementRegistry {
        &self.registry
    }

    pub fn num_reads(&self) -> u32 {
        self.registry.capacity()
    }

    pub fn unitig(&self, id: UnitigId) -> Option<&Unitig> {
        self.unitigs.get(id as usize).and_then(|t| t.as_ref())
    }

    pub fn unitig_of_read(&self, id: ReadId) -> Option<&Unitig> {
        self.registry.unitig_of(id).and_then(|t| self.unitig(t))
    }

    /// Live unitigs in id order.
    pub fn unitigs(&self) -> impl Iterator<Item = &Unitig> {
        self.unitigs.iter().filter_map(|t| t.as_ref())
    }

    pub fn num_unitigs(&self) -> usize {
        self.unitigs().count()
    }

    pub(crate) fn live_ids(&self) -> Vec<UnitigId> {
        self.unitigs().map(|t| t.id()).collect()
    }

    pub(crate) fn next_unitig_id(&self) -> UnitigId {
        self.unitigs.len() as UnitigId
    }

    /// Stores a unitig under the next free id. Its reads must already
    /// be registered under that id.
    pub(crate) fn push_unitig(&mut self, mut tig: Unitig) -> UnitigId {
        let id = self.next_unitig_id();
        tig.set_id(id);
        self.unitigs.push(Some(tig));
        id
    }

    pub fn into_unitigs(self) -> Vec<Unitig> {
        self.unitigs.into_iter().flatten().collect()
    }

    /// Walks the best-overlap graph from every unplaced, uncontained
    /// read in ascending id order, then places the contained reads.
    pub fn build(&mut self) -> BogResult<()> {
        let walker = ChunkGraph::new(self.bog);
        self.build_with(&walker)
    }

    pub fn build_with<W: ChunkWalker>(&mut self, walker: &W) -> BogResult<()> {
        let num_reads = self.reads.num_reads();

        for id in 1..=num_reads {
            let len = self.reads.read_length(id) as i64;
            if len == 0 || self.bog.is_contained(id) || self.registry.is_placed(id)? {
                continue;
            }

            let tig_id = self.next_unitig_id();
            let mut tig = Unitig::new(tig_id);
            tig.add_read(PlacedRead::dovetail(
                id,
                Orientation::Forward,
                SeqInterval::new(0, len),
            ));
            self.registry.place_dovetail(id, tig_id)?;

            let forward = self.populate_unitig(&mut tig, id, walker)?;
            tig.reverse_complement();
            let backward = self.populate_unitig(&mut tig, id, walker)?;
            tig.reverse_complement();

            place_contains(
                &mut tig,
                &mut self.registry,
                &self.containers,
                self.bog,
                self.reads,
            )?;
            tig.sort();

            if log::log_enabled!(log::Level::Trace) {
                log::trace!(
                    "unitig {} seeded from read {}: {} of {} reads forward, {} of {} backward, {} total",
                    tig_id,
                    id,
                    forward,
                    walker.chunk_length(id, ReadEnd::ThreePrime) - 1,
                    backward,
                    walker.chunk_length(id, ReadEnd::FivePrime) - 1,
                    tig.num_frags()
                );
            }
            self.unitigs.push(Some(tig));
        }

        self.check_contained_placed()?;

        if self.global_arrival_rate.is_none() {
            let rate = self.estimate_global_arrival_rate();
            self.set_global_arrival_rate(rate)?;
        }

        log::info!(
            "built {} unitigs from {} reads",
            self.num_unitigs(),
            num_reads
        );
        Ok(())
    }

    /// Extends `tig` out of the tail end of its last backbone read
    /// until the walk dead-ends, reaches a placed read, or comes back
    /// to `seed`. Returns the number of reads added.
    pub fn populate_unitig<W: ChunkWalker>(
        &mut self,
        tig: &mut Unitig,
        seed: ReadId,
        walker: &W,
    ) -> BogResult<usize> {
        let mut added = 0;

        while let Some(last) = tig.last_backbone_node().copied() {
            let next = match walker.next_in_chunk(last.id, last.tail_end()) {
                Some(next) => next,
                None => break,
            };

            if next.id == seed {
                log::debug!("unitig {} circles back to read {}", tig.id(), seed);
                break;
            }
            if self.registry.is_placed(next.id)? {
                log::trace!(
                    "walk from {} stops at read {}, already in unitig {:?}",
                    last.id,
                    next.id,
                    self.registry.unitig_of(next.id)
                );
                break;
            }

            let len = self.reads.read_length(next.id) as i64;
            if len == 0 {
                log::debug!("read {} has no length, walk stops", next.id);
                break;
            }

            let placed = match place_next(self.bog, self.reads, &last, next.id, len) {
                Some(p) if p.head_end() == next.end => p,
                _ => {
                    log::debug!(
                        "best edges of {} and {} disagree with the walk, stopping",
                        last.id,
                        next.id
                    );
                    break;
                }
            };

            self.registry.place_dovetail(next.id, tig.id())?;
            tig.add_read(placed);
            added += 1;
        }

        Ok(added)
    }

    fn check_contained_placed(&self) -> BogResult<()> {
        for id in 1..=self.reads.num_reads() {
            if self.reads.read_length(id) == 0 {
                continue;
            }
            if let Some(cont) = self.bog.container_of(id) {
                if self.registry.get(id)? == Placement::Unplaced {
                    return Err(BogError::MissingContainer {
                        read: id,
                        container: cont.container,
                    });
                }
            }
        }
        Ok(())
    }

    /// Verifies that every placed read is in exactly the unitig the
    /// registry says it is in, and that no read appears twice.
    pub fn check_placement(&self) -> BogResult<()> {
        let mut seen: FnvHashSet<ReadId> = FnvHashSet::default();
        for tig in self.unitigs() {
            for read in tig.reads() {
                let registered = match self.registry.get(read.id)? {
                    Placement::Dovetail(t) if !read.is_contained() => t,
                    Placement::Contained(t) if read.is_contained() => t,
                    other => other.unitig().unwrap_or(0),
                };
                if registered != tig.id() || !seen.insert(read.id) {
                    return Err(BogError::AlreadyPlaced {
                        read: read.id,
                        unitig: tig.id(),
                    });
                }
            }
        }
        self.check_contained_placed()
    }

    pub fn global_arrival_rate(&self) -> Option<f64> {
        self.global_arrival_rate
    }

    /// Establishes the baseline every coverage statistic is measured
    /// against. May only happen once.
    pub fn set_global_arrival_rate(&mut self, rate: f64) -> BogResult<()> {
        if self.global_arrival_rate.is_some() {
            return Err(BogError::ArrivalRateAlreadySet);
        }
        log::info!("global arrival rate {:.6}", rate);
        self.global_arrival_rate = Some(rate);
        Ok(())
    }

    /// Reads per base: from the configured genome size if there is
    /// one, otherwise pooled over the unitigs that span anything.
    pub fn estimate_global_arrival_rate(&self) -> f64 {
        let total: usize = self.unitigs().map(|t| t.num_dovetail()).sum();

        if let Some(genome_size) = self.config.genome_size.filter(|&g| g > 0) {
            return total as f64 / genome_size as f64;
        }

        let (frags, rho) = self
            .unitigs()
            .map(|t| (t.num_dovetail(), t.avg_rho()))
            .filter(|(_, rho)| *rho > 0.0)
            .fold((0, 0.0), |(n, r), (tn, tr)| (n + tn, r + tr));

        if rho > 0.0 {
            frags as f64 / rho
        } else {
            0.0
        }
    }

    pub fn cov_stat(&self, id: UnitigId) -> BogResult<f64> {
        let global = self.global_arrival_rate.ok_or(BogError::ArrivalRateUnset)?;
        let tig = self.unitig(id).ok_or(BogError::UnknownUnitig(id))?;
        tig.cov_stat(Some(global))
    }

    pub fn set_local_arrival_rate(&mut self, id: UnitigId, rate: f64) -> BogResult<()> {
        match self.unitigs.get_mut(id as usize) {
            Some(Some(tig)) => {
                tig.set_local_arrival_rate(rate);
                Ok(())
            }
            _ => Err(BogError::UnknownUnitig(id)),
        }
    }

    /// Build, break, and merge as configured, then verify placement.
    pub fn run(&mut self) -> BogResult<()> {
        self.build()?;

        if self.config.break_unitigs {
            self.break_unitigs()?;
        }
        if self.config.merge_unitigs {
            self.merge_all_unitigs()?;
        }

        self.check_placement()?;

        let counts = self.count_internal_best_edges();
        log::info!("{} unitigs, internal best edges: {}", self.num_unitigs(), counts);
        Ok(())
    }
}
