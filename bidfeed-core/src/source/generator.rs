use std::cmp;
use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Interval, MissedTickBehavior};

use crate::message::{RawRecord, Watermark, WinningBid};
use crate::source::{SourceConnector, SourceType, SubscribeReader};
use crate::{Error, Result};

const ITEMS: &[&str] = &[
    "Signed Memorabilia",
    "City Bar Crawl",
    "Best Pizza in Town",
    "Gift Basket",
    "Custom Art",
];

const DEFAULT_INTERVAL_MS: u64 = 1000;
const DEFAULT_ROWS_PER_INTERVAL: usize = 2;

/// Tuning for the synthetic auction feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// How often a batch of winning bids and its closing marker are produced.
    pub interval: Duration,
    pub rows_per_interval: usize,
    /// Earliest watermark the feed can resume from. Resuming below it fails
    /// with [`Error::ResumeExpired`].
    pub retained_from: Watermark,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            rows_per_interval: DEFAULT_ROWS_PER_INTERVAL,
            retained_from: 0,
        }
    }
}

/// Synthetic subscribe feed: every tick yields `rows_per_interval` winning
/// bids followed by the progress marker that confirms them. The feed never
/// closes on its own.
#[derive(Debug)]
pub struct BidGenerator {
    config: GeneratorConfig,
    ticker: Interval,
    pending: VecDeque<RawRecord>,
    last_watermark: Watermark,
    seq: i64,
}

impl BidGenerator {
    pub fn connect(config: GeneratorConfig, resume_from: Option<Watermark>) -> Result<Self> {
        if let Some(resume_from) = resume_from {
            if resume_from < config.retained_from {
                return Err(Error::ResumeExpired {
                    resume_from,
                    retained_from: config.retained_from,
                });
            }
        }
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self {
            last_watermark: resume_from.unwrap_or(config.retained_from),
            ticker,
            pending: VecDeque::new(),
            seq: 0,
            config,
        })
    }

    /// Wall-clock derived, strictly increasing across markers.
    fn next_watermark(&mut self) -> Watermark {
        let now = Utc::now().timestamp_millis() as Watermark;
        self.last_watermark = cmp::max(self.last_watermark + 1, now);
        self.last_watermark
    }

    fn next_bid(&mut self) -> WinningBid {
        self.seq += 1;
        let item = ITEMS[self.seq as usize % ITEMS.len()];
        WinningBid {
            auction_id: self.seq,
            bid_id: 10_000 + self.seq,
            item: item.to_string(),
            amount: 100 + (self.seq * 37) % 900,
        }
    }
}

impl SubscribeReader for BidGenerator {
    fn name(&self) -> &'static str {
        "generator"
    }

    async fn read(&mut self) -> Result<Option<RawRecord>> {
        if let Some(record) = self.pending.pop_front() {
            return Ok(Some(record));
        }
        self.ticker.tick().await;
        for _ in 0..self.config.rows_per_interval {
            let bid = self.next_bid();
            self.pending.push_back(RawRecord::Data(bid));
        }
        let watermark = self.next_watermark();
        self.pending.push_back(RawRecord::Progress { watermark });
        Ok(self.pending.pop_front())
    }
}

#[derive(Clone)]
pub struct GeneratorConnector {
    config: GeneratorConfig,
}

impl GeneratorConnector {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }
}

impl SourceConnector for GeneratorConnector {
    async fn connect(&mut self, resume_from: Option<Watermark>) -> Result<SourceType> {
        let generator = BidGenerator::connect(self.config.clone(), resume_from)?;
        Ok(SourceType::Generator(generator))
    }
}
