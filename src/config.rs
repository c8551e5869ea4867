use std::path::PathBuf;
use std::str::FromStr;

use crate::transport::DEFAULT_CHANNEL_CAPACITY;

/// Process configuration, read from `SLOTBOOK_*` environment variables.
/// Missing or unparseable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends between compactions.
    pub compact_threshold: u64,
    pub event_channel_capacity: usize,
    /// `false` keeps everything in memory; nothing survives a restart.
    pub durable: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            event_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            durable: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("SLOTBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: parse_var(&lookup, "SLOTBOOK_METRICS_PORT"),
            compact_threshold: parse_var(&lookup, "SLOTBOOK_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            event_channel_capacity: parse_var(&lookup, "SLOTBOOK_EVENT_CHANNEL_CAPACITY")
                .unwrap_or(defaults.event_channel_capacity),
            durable: parse_var(&lookup, "SLOTBOOK_DURABLE").unwrap_or(defaults.durable),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("slotbook.wal")
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}
