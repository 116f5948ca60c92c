use crate::error::{BogError, BogResult};
use crate::fragment::{ReadId, UnitigId};

/// Where a read currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Unplaced,
    /// On the backbone of a unitig.
    Dovetail(UnitigId),
    /// Inside a unitig, positioned by its container.
    Contained(UnitigId),
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Unplaced
    }
}

impl Placement {
    pub fn unitig(&self) -> Option<UnitigId> {
        match self {
            Placement::Unplaced => None,
            Placement::Dovetail(t) | Placement::Contained(t) => Some(*t),
        }
    }
}

/// Read id to unitig index. Sized once for the whole read range; a
/// read can be placed in at most one unitig at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRegistry {
    placements: Vec<Placement>,
}

impl PlacementRegistry {
    pub fn new(num_reads: u32) -> Self {
        PlacementRegistry {
            placements: vec![Placement::Unplaced; num_reads as usize + 1],
        }
    }

    pub fn capacity(&self) -> u32 {
        self.placements.len().saturating_sub(1) as u32
    }

    fn slot(&self, id: ReadId) -> BogResult<usize> {
        let ix = id as usize;
        if id == 0 || ix >= self.placements.len() {
            return Err(BogError::RegistryOverflow {
                read: id,
                capacity: self.capacity(),
            });
        }
        Ok(ix)
    }

    pub fn get(&self, id: ReadId) -> BogResult<Placement> {
        let ix = self.slot(id)?;
        Ok(self.placements[ix])
    }

    pub fn unitig_of(&self, id: ReadId) -> Option<UnitigId> {
        self.get(id).ok().and_then(|p| p.unitig())
    }

    pub fn is_placed(&self, id: ReadId) -> BogResult<bool> {
        Ok(self.get(id)? != Placement::Unplaced)
    }

    fn place(&mut self, id: ReadId, placement: Placement) -> BogResult<()> {
        let ix = self.slot(id)?;
        if let Some(unitig) = self.placements[ix].unitig() {
            return Err(BogError::AlreadyPlaced { read: id, unitig });
        }
        self.placements[ix] = placement;
        Ok(())
    }

    pub fn place_dovetail(&mut self, id: ReadId, tig: UnitigId) -> BogResult<()> {
        self.place(id, Placement::Dovetail(tig))
    }

    pub fn place_contained(
        &mut self,
        id: ReadId,
        tig: UnitigId,
    ) -> BogResult<()> {
        self.place(id, Placement::Contained(tig))
    }

    /// Moves an already placed read to another unitig, keeping how it
    /// was placed.
    pub fn reassign(&mut self, id: ReadId, tig: UnitigId) -> BogResult<()> {
        let ix = self.slot(id)?;
        self.placements[ix] = match self.placements[ix] {
            Placement::Dovetail(_) => Placement::Dovetail(tig),
            Placement::Contained(_) => Placement::Contained(tig),
            Placement::Unplaced => Placement::Dovetail(tig),
        };
        Ok(())
    }

    pub fn release(&mut self, id: ReadId) -> BogResult<()> {
        let ix = self.slot(id)?;
        self.placements[ix] = Placement::Unplaced;
        Ok(())
    }

    pub fn clear(&mut self) {
        for p in self.placements.iter_mut() {
            *p = Placement::Unplaced;
        }
    }

    /// Placed reads and where they are, in read id order.
    pub fn iter(&self) -> impl Iterator<Item = (ReadId, Placement)> + '_ {
        self.placements
            .iter()
            .enumerate()
            .skip(1)
            .map(|(ix, p)| (ix as ReadId, *p))
    }
}
