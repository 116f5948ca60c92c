pub mod best_overlap;
pub mod breakpoints;
pub mod chunk;
pub mod config;
pub mod containment;
pub mod error;
pub mod fragment;
pub mod layout;
pub mod merge;
pub mod mmap;
pub mod parser;
pub mod placement;
pub mod reads;
pub mod unitig;
pub mod unitig_graph;

pub use config::UnitigConfig;
pub use error::{BogError, BogResult};
pub use unitig_graph::UnitigGraph;
