use std::{error, fmt};

use crate::fragment::{ReadId, UnitigId};

pub type BogResult<T> = Result<T, BogError>;

/// Conditions that abort a unitig build. Variants name the read or
/// unitig that triggered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BogError {
    /// Following container links from `read` came back to a read
    /// already on the chain.
    ContainmentCycle { read: ReadId, container: ReadId },
    /// A read id beyond what the placement registry was sized for.
    RegistryOverflow { read: ReadId, capacity: u32 },
    /// A read was about to be placed in a second unitig.
    AlreadyPlaced { read: ReadId, unitig: UnitigId },
    /// A read id the metadata provider doesn't know about.
    UnknownRead(ReadId),
    /// A unitig id that is not live.
    UnknownUnitig(UnitigId),
    /// A contained read whose container is missing or never placed.
    MissingContainer { read: ReadId, container: ReadId },
    /// Coverage statistics were requested before the global arrival
    /// rate was established.
    ArrivalRateUnset,
    /// The global arrival rate may only be established once.
    ArrivalRateAlreadySet,
}

impl fmt::Display for BogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BogError as BE;
        match self {
            BE::ContainmentCycle { read, container } => write!(
                f,
                "Containment cycle: read {} is (transitively) contained in read {} which leads back to it",
                read, container
            ),
            BE::RegistryOverflow { read, capacity } => write!(
                f,
                "Read {} is outside the placement registry (sized for {} reads)",
                read, capacity
            ),
            BE::AlreadyPlaced { read, unitig } => {
                write!(f, "Read {} is already placed in unitig {}", read, unitig)
            }
            BE::UnknownRead(read) => write!(f, "Unknown read {}", read),
            BE::UnknownUnitig(tig) => write!(f, "No live unitig {}", tig),
            BE::MissingContainer { read, container } => write!(
                f,
                "Contained read {} refers to container {} which is not placed",
                read, container
            ),
            BE::ArrivalRateUnset => write!(
                f,
                "Coverage statistic requested before the global arrival rate was set"
            ),
            BE::ArrivalRateAlreadySet => {
                write!(f, "The global arrival rate has already been set")
            }
        }
    }
}

impl error::Error for BogError {}
