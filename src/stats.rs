//! Channel statistics collection and export.
//!
//! Every storage keeps a small set of counters ([`ChannelStats`]). After a
//! run, the registry gathers them into a [`PortStats`] snapshot that can be
//! exported as JSON or CSV, or printed as a human-readable summary.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::endpoint::PortKind;
use crate::types::{Cycle, InstanceId};

/// Counters maintained by a single storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Items accepted by writes
    pub items_written: u64,
    /// Items returned by reads
    pub items_read: u64,
    /// Reads that found nothing due
    pub soft_misses: u64,
    /// Rows stamped with a new cycle
    pub rows_filled: u64,
    /// Highest number of items buffered at once
    pub peak_occupancy: usize,
    /// Number of one-cycle stalls applied
    pub stalls: u64,
    /// Last cycle in which an item was written
    pub last_write_cycle: Option<Cycle>,
    /// Last cycle in which an item was read
    pub last_read_cycle: Option<Cycle>,
}

impl ChannelStats {
    /// Items written but not yet read.
    pub fn in_flight(&self) -> u64 {
        self.items_written.saturating_sub(self.items_read)
    }
}

/// Statistics of one connected channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// Channel name
    pub name: String,
    /// Channel instance
    pub instance: InstanceId,
    /// Position among the writer's fanout storages
    pub fanout_index: usize,
    /// Role of the reading endpoint
    pub reader: PortKind,
    /// Items per cycle row
    pub bandwidth: u32,
    /// Cycles between write and earliest read
    pub latency: u32,
    /// Counters collected by the storage
    pub stats: ChannelStats,
}

/// Aggregate statistics over every channel of a registry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PortStats {
    /// Per-channel statistics, in connection order
    pub channels: Vec<ChannelSummary>,
}

impl PortStats {
    /// Creates an empty statistics container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a channel's statistics.
    pub fn push(&mut self, summary: ChannelSummary) {
        self.channels.push(summary);
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total items written over all channels.
    pub fn total_written(&self) -> u64 {
        self.channels.iter().map(|c| c.stats.items_written).sum()
    }

    /// Total items read over all channels.
    pub fn total_read(&self) -> u64 {
        self.channels.iter().map(|c| c.stats.items_read).sum()
    }

    /// Finds the statistics of the channels carrying `name`.
    pub fn find(&self, name: &str) -> Vec<&ChannelSummary> {
        self.channels.iter().filter(|c| c.name == name).collect()
    }

    /// Exports statistics to a JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "channel_count": self.channel_count(),
            "total_written": self.total_written(),
            "total_read": self.total_read(),
            "channels": self.channels,
        })
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports per-channel statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("name,instance,fanout_index,reader,bandwidth,latency,items_written,items_read,soft_misses,peak_occupancy,stalls\n");

        for c in &self.channels {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{}\n",
                c.name,
                c.instance,
                c.fanout_index,
                c.reader,
                c.bandwidth,
                c.latency,
                c.stats.items_written,
                c.stats.items_read,
                c.stats.soft_misses,
                c.stats.peak_occupancy,
                c.stats.stalls,
            ));
        }

        csv
    }

    /// Exports per-channel statistics to a CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Port Statistics ===")?;
        writeln!(w, "Channels: {}", self.channel_count())?;
        writeln!(w, "Items written: {}", self.total_written())?;
        writeln!(w, "Items read: {}", self.total_read())?;
        writeln!(w)?;

        for c in &self.channels {
            writeln!(
                w,
                "{}[{}]#{} ({}, bw {}, lat {}):",
                c.name, c.instance, c.fanout_index, c.reader, c.bandwidth, c.latency
            )?;
            writeln!(
                w,
                "  written {}, read {}, in flight {}",
                c.stats.items_written,
                c.stats.items_read,
                c.stats.in_flight()
            )?;
            writeln!(
                w,
                "  soft misses {}, peak occupancy {}, stalls {}",
                c.stats.soft_misses, c.stats.peak_occupancy, c.stats.stalls
            )?;
        }

        Ok(())
    }

    /// Returns a summary string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PortStats {
        let mut stats = PortStats::new();
        stats.push(ChannelSummary {
            name: "fetch".to_string(),
            instance: 0,
            fanout_index: 0,
            reader: PortKind::Read,
            bandwidth: 2,
            latency: 1,
            stats: ChannelStats {
                items_written: 10,
                items_read: 8,
                soft_misses: 3,
                rows_filled: 5,
                peak_occupancy: 4,
                stalls: 0,
                last_write_cycle: Some(9),
                last_read_cycle: Some(9),
            },
        });
        stats.push(ChannelSummary {
            name: "retire".to_string(),
            instance: 1,
            fanout_index: 0,
            reader: PortKind::ReadStall,
            bandwidth: 1,
            latency: 2,
            stats: ChannelStats {
                items_written: 4,
                items_read: 4,
                stalls: 2,
                ..Default::default()
            },
        });
        stats
    }

    #[test]
    fn test_totals() {
        let stats = sample();
        assert_eq!(stats.channel_count(), 2);
        assert_eq!(stats.total_written(), 14);
        assert_eq!(stats.total_read(), 12);
        assert_eq!(stats.channels[0].stats.in_flight(), 2);
        assert_eq!(stats.find("retire").len(), 1);
    }

    #[test]
    fn test_json_export() {
        let stats = sample();
        let value = stats.to_value();
        assert_eq!(value["channel_count"], 2);
        assert_eq!(value["total_written"], 14);
        assert_eq!(value["channels"][1]["stats"]["stalls"], 2);

        let json = stats.to_json().unwrap();
        let restored: PortStats = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.channels[0].stats, stats.channels[0].stats);
    }

    #[test]
    fn test_csv_export() {
        let csv = sample().to_csv();
        assert!(csv.contains("fetch,0,0,Read,2,1,10,8,3,4,0"));
        assert!(csv.contains("retire,1,0,ReadStall,1,2,4,4,0,0,2"));
    }

    #[test]
    fn test_summary_output() {
        let summary = sample().summary();
        assert!(summary.contains("Channels: 2"));
        assert!(summary.contains("fetch[0]#0"));
        assert!(summary.contains("in flight 2"));
    }
}
