//! Run configuration
//!
//! One explicit value per run, passed into the writer and handler
//! constructors; parallel runs in tests each build their own.

use crate::output::MergeMode;
use crate::ttl::Format;

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Input OSM file (.osm, .osm.gz or .pbf)
    pub input: String,
    /// Output file; stdout when empty
    pub output: String,
    /// Serialization format
    pub format: Format,
    /// Compress the output with gzip
    pub output_compress: bool,
    /// How per-section part files are combined
    pub merge_output: MergeMode,
}
