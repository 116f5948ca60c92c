#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Parameters of a unitig build.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(default))]
pub struct UnitigConfig {
    /// A break is big when the unitig on the other side of the
    /// discordant edge is at least this long...
    pub min_break_length: i64,
    /// ...and holds more than this many reads.
    pub min_break_frags: usize,
    pub break_unitigs: bool,
    pub merge_unitigs: bool,
    /// When known, the global arrival rate is derived from it instead
    /// of being estimated from the unitigs.
    pub genome_size: Option<u64>,
    /// Reads per layout file when writing several; 0 writes a single
    /// file.
    pub fragment_count_target: usize,
}

impl Default for UnitigConfig {
    fn default() -> Self {
        UnitigConfig {
            min_break_length: 500,
            min_break_frags: 1,
            break_unitigs: true,
            merge_unitigs: true,
            genome_size: None,
            fragment_count_target: 0,
        }
    }
}

impl UnitigConfig {
    /// Walk and place reads only.
    pub fn build_only() -> Self {
        UnitigConfig {
            break_unitigs: false,
            merge_unitigs: false,
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Default::default()
    }

    pub fn with_genome_size(mut self, genome_size: u64) -> Self {
        self.genome_size = Some(genome_size);
        self
    }
}

#[cfg(feature = "serde1")]
impl UnitigConfig {
    /// Save the config as a JSON file.
    pub fn save_json<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> std::io::Result<()> {
        use std::{fs::File, io::BufWriter};
        let file = File::create(path.as_ref())?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load a config from a JSON file. Missing fields take their
    /// default values.
    pub fn load_json<P: AsRef<std::path::Path>>(
        path: P,
    ) -> std::io::Result<Self> {
        use std::{fs::File, io::BufReader};
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let config: UnitigConfig = serde_json::from_reader(reader)?;
        Ok(config)
    }
}
