//! Content known to the simulated backend.

use std::collections::HashMap;
use std::time::Duration;

/// Linear channel offered by the simulated backend.
#[derive(Debug, Clone)]
pub struct SimulatedChannel {
    pub channel_id: String,
    pub name: String,
    pub entitled: bool,
    /// Fast-forward and rewind allowed on grants for this channel
    pub trick_play: bool,
    /// Pause and timeshift allowed on grants for this channel
    pub timeshift: bool,
    /// Every Nth program slot is blacked out for catch-up
    pub blackout_every: Option<u32>,
}

/// On-demand asset offered by the simulated backend.
#[derive(Debug, Clone)]
pub struct SimulatedAsset {
    pub asset_id: String,
    pub title: String,
    pub duration: Duration,
    pub entitled: bool,
    pub ff_enabled: bool,
    /// Resume offset returned with grants, milliseconds
    pub bookmark_ms: Option<i64>,
    pub encrypted: bool,
}

/// Channel and asset listing shared by the simulated services.
#[derive(Debug, Clone, Default)]
pub struct SimulatedCatalog {
    channels: HashMap<String, SimulatedChannel>,
    assets: HashMap<String, SimulatedAsset>,
}

impl SimulatedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog populated with a handful of channels and open movies.
    pub fn with_default_content() -> Self {
        let mut catalog = Self::new();

        catalog.add_channel(SimulatedChannel {
            channel_id: "news24".to_string(),
            name: "News 24".to_string(),
            entitled: true,
            trick_play: true,
            timeshift: true,
            blackout_every: None,
        });
        catalog.add_channel(SimulatedChannel {
            channel_id: "sports1".to_string(),
            name: "Sports One".to_string(),
            entitled: true,
            trick_play: false,
            timeshift: true,
            blackout_every: Some(3),
        });
        catalog.add_channel(SimulatedChannel {
            channel_id: "premium".to_string(),
            name: "Premium Cinema".to_string(),
            entitled: false,
            trick_play: true,
            timeshift: true,
            blackout_every: None,
        });

        catalog.add_asset(SimulatedAsset {
            asset_id: "big-buck-bunny".to_string(),
            title: "Big Buck Bunny".to_string(),
            duration: Duration::from_secs(596),
            entitled: true,
            ff_enabled: true,
            bookmark_ms: Some(120_000),
            encrypted: false,
        });
        catalog.add_asset(SimulatedAsset {
            asset_id: "sintel".to_string(),
            title: "Sintel".to_string(),
            duration: Duration::from_secs(888),
            entitled: true,
            ff_enabled: true,
            bookmark_ms: None,
            encrypted: true,
        });
        catalog.add_asset(SimulatedAsset {
            asset_id: "tears-of-steel".to_string(),
            title: "Tears of Steel".to_string(),
            duration: Duration::from_secs(734),
            entitled: true,
            ff_enabled: false,
            bookmark_ms: Some(30_000),
            encrypted: false,
        });
        catalog.add_asset(SimulatedAsset {
            asset_id: "elephants-dream".to_string(),
            title: "Elephants Dream".to_string(),
            duration: Duration::from_secs(654),
            entitled: false,
            ff_enabled: true,
            bookmark_ms: None,
            encrypted: false,
        });

        catalog
    }

    pub fn add_channel(&mut self, channel: SimulatedChannel) {
        self.channels.insert(channel.channel_id.clone(), channel);
    }

    pub fn add_asset(&mut self, asset: SimulatedAsset) {
        self.assets.insert(asset.asset_id.clone(), asset);
    }

    pub fn channel(&self, channel_id: &str) -> Option<&SimulatedChannel> {
        self.channels.get(channel_id)
    }

    pub fn asset(&self, asset_id: &str) -> Option<&SimulatedAsset> {
        self.assets.get(asset_id)
    }

    /// Channel ids in lexical order.
    pub fn channel_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.channels.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Asset ids in lexical order.
    pub fn asset_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.assets.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
