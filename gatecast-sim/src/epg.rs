//! Slot-based EPG for simulated channels.
//!
//! Every channel airs back-to-back programs of a fixed length aligned to the
//! unix epoch. A program id encodes its channel and slot start, so details
//! can be recovered from the id alone.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatecast_core::errors::MetadataError;
use gatecast_core::model::Program;
use gatecast_core::traits::MetadataLookup;

use crate::catalog::SimulatedCatalog;

/// Program guide generated from the catalog's channels.
#[derive(Debug, Clone)]
pub struct SimulatedEpg {
    catalog: Arc<SimulatedCatalog>,
    slot_secs: i64,
}

impl SimulatedEpg {
    pub fn new(catalog: Arc<SimulatedCatalog>, slot_minutes: u32) -> Self {
        Self {
            catalog,
            slot_secs: i64::from(slot_minutes.max(1)) * 60,
        }
    }

    pub fn slot_length(&self) -> Duration {
        Duration::from_secs(self.slot_secs.unsigned_abs())
    }

    /// Program airing on `channel_id` at `at`.
    pub fn program_at(&self, channel_id: &str, at: DateTime<Utc>) -> Option<Program> {
        let slot = at.timestamp().div_euclid(self.slot_secs);
        self.program_in_slot(channel_id, slot)
    }

    /// Slot number of a program id produced by this EPG.
    pub fn slot_of(&self, channel_id: &str, program_id: &str) -> Option<i64> {
        let (channel, start) = program_id.rsplit_once('-')?;
        if channel != channel_id {
            return None;
        }
        let start: i64 = start.parse().ok()?;
        (start.rem_euclid(self.slot_secs) == 0).then(|| start / self.slot_secs)
    }

    fn program_in_slot(&self, channel_id: &str, slot: i64) -> Option<Program> {
        self.catalog.channel(channel_id)?;
        let start_secs = slot.checked_mul(self.slot_secs)?;
        let start = DateTime::from_timestamp(start_secs, 0)?;
        let end = DateTime::from_timestamp(start_secs.checked_add(self.slot_secs)?, 0)?;
        Some(
            Program::new(channel_id, format!("{channel_id}-{start_secs}"))
                .with_schedule(start, end),
        )
    }
}

#[async_trait]
impl MetadataLookup for SimulatedEpg {
    async fn program_details(
        &self,
        channel_id: &str,
        program_id: &str,
    ) -> Result<Program, MetadataError> {
        self.slot_of(channel_id, program_id)
            .and_then(|slot| self.program_in_slot(channel_id, slot))
            .ok_or_else(|| MetadataError::NotFound {
                channel_id: channel_id.to_string(),
                program_id: program_id.to_string(),
            })
    }

    async fn epg_at(
        &self,
        channel_id: &str,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<Program>, MetadataError> {
        let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX / 2);
        let first = at
            .timestamp()
            .saturating_sub(window_secs)
            .div_euclid(self.slot_secs);
        let last = at
            .timestamp()
            .saturating_add(window_secs)
            .div_euclid(self.slot_secs);

        Ok((first..=last)
            .filter_map(|slot| self.program_in_slot(channel_id, slot))
            .collect())
    }
}
