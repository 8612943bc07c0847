use std::sync::Arc;
use tokio::{
    sync::{mpsc, RwLock},
    task::JoinHandle,
    time::{interval, sleep, Duration, MissedTickBehavior},
};

use super::event_parser::{EventParser, LoggedEvent};
use crate::{
    config::Config,
    constants::{EVENT_MAX_BLOCKS_PER_TICK, EVENT_TRANSIENT_BACKOFF_MAX_SECS},
    error::Result,
    services::onchain::ChainClient,
};

// Provider errors that clear up on their own, such as rate limits or timeouts.
fn is_transient_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("error decoding response body")
        || lower.contains("too many requests")
        || lower.contains("429")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("gateway")
        || lower.contains("temporarily unavailable")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
}

fn transient_backoff_secs(poll_secs: u64, failures: u32) -> u64 {
    let exponent = failures.saturating_sub(1).min(5);
    let candidate = poll_secs.saturating_mul(1_u64 << exponent);
    candidate.clamp(poll_secs, EVENT_TRANSIENT_BACKOFF_MAX_SECS.max(poll_secs))
}

/// Inclusive block range for the next scan, or `None` when caught up.
fn next_range(last: Option<u64>, head: u64, backfill: u64, max_per_tick: u64) -> Option<(u64, u64)> {
    let start = match last {
        None => head.saturating_sub(backfill.saturating_sub(1)),
        Some(last) if last >= head => return None,
        Some(last) => last + 1,
    };
    let end = start.saturating_add(max_per_tick.saturating_sub(1)).min(head);
    Some((start, end))
}

/// Event Watcher - polls contract logs and forwards decoded events
pub struct EventWatcher {
    chain: Arc<dyn ChainClient>,
    parser: EventParser,
    poll_secs: u64,
    backfill_blocks: u64,
    max_blocks_per_tick: u64,
    last_block: RwLock<Option<u64>>,
    tx: mpsc::Sender<LoggedEvent>,
}

impl EventWatcher {
    pub fn new(chain: Arc<dyn ChainClient>, config: &Config, tx: mpsc::Sender<LoggedEvent>) -> Self {
        Self {
            chain,
            parser: EventParser::new(),
            poll_secs: config.event_poll_interval_secs.max(1),
            backfill_blocks: config.event_backfill_blocks.max(1),
            max_blocks_per_tick: EVENT_MAX_BLOCKS_PER_TICK,
            last_block: RwLock::new(None),
            tx,
        }
    }

    pub async fn last_block(&self) -> Option<u64> {
        *self.last_block.read().await
    }

    /// Start the watcher loop; ends once the receiving side is dropped.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(self.poll_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut transient_failures: u32 = 0;

            loop {
                ticker.tick().await;
                if self.tx.is_closed() {
                    tracing::info!("Event watcher stopped: no subscribers left");
                    break;
                }

                match self.scan_once().await {
                    Ok(_) => transient_failures = 0,
                    Err(e) => {
                        let err_text = e.to_string();
                        if is_transient_error(&err_text) {
                            transient_failures = transient_failures.saturating_add(1);
                            let backoff_secs = transient_backoff_secs(self.poll_secs, transient_failures);
                            tracing::warn!(
                                "Event watcher transient error: {} (backoff={}s, failures={})",
                                err_text,
                                backoff_secs,
                                transient_failures
                            );
                            sleep(Duration::from_secs(backoff_secs)).await;
                        } else {
                            transient_failures = 0;
                            tracing::error!("Event watcher error: {}", err_text);
                        }
                    }
                }
            }
        })
    }

    /// One poll: read the head, fetch the next range, forward decoded events.
    /// Returns the number of events forwarded.
    pub async fn scan_once(&self) -> Result<usize> {
        let previous = *self.last_block.read().await;
        let head = self.chain.block_number().await?;
        let Some((start, end)) = next_range(previous, head, self.backfill_blocks, self.max_blocks_per_tick)
        else {
            return Ok(0);
        };

        tracing::debug!("Scanning blocks {} to {} (head: {})", start, end, head);
        let logs = self.chain.logs(start, end).await?;

        let mut forwarded = 0;
        for log in &logs {
            let Some(event) = self.parser.parse_log(log) else {
                continue;
            };
            if self.tx.send(event).await.is_err() {
                break;
            }
            forwarded += 1;
        }

        *self.last_block.write().await = Some(end);
        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        indexer::event_parser::{fixtures::area_log, ChainEvent, AREA_BOMBED_SIGNATURE},
        test_support::MockChain,
    };
    use ethers::types::Address;

    #[test]
    fn first_scan_backfills_from_head() {
        assert_eq!(next_range(None, 1_000, 128, 500), Some((873, 1_000)));
        assert_eq!(next_range(None, 10, 128, 500), Some((0, 10)));
    }

    #[test]
    fn later_scans_resume_after_last_block_and_are_capped() {
        assert_eq!(next_range(Some(100), 2_000, 128, 500), Some((101, 600)));
        assert_eq!(next_range(Some(100), 100, 128, 500), None);
    }

    #[test]
    fn backoff_doubles_and_clamps() {
        assert_eq!(transient_backoff_secs(5, 1), 5);
        assert_eq!(transient_backoff_secs(5, 2), 10);
        assert_eq!(transient_backoff_secs(5, 3), 20);
        assert_eq!(transient_backoff_secs(5, 40), 160);
        assert_eq!(transient_backoff_secs(20, 40), EVENT_TRANSIENT_BACKOFF_MAX_SECS);
    }

    #[test]
    fn rate_limits_are_transient() {
        assert!(is_transient_error("HTTP 429 Too Many Requests"));
        assert!(is_transient_error("request timed out"));
        assert!(!is_transient_error("execution reverted"));
    }

    #[tokio::test]
    async fn scan_forwards_events_and_advances() {
        let chain = Arc::new(MockChain::connected());
        let user = Address::repeat_byte(0x07);
        chain.set_block_number(20);
        chain.push_log(area_log(AREA_BOMBED_SIGNATURE, user, 10, 11, 3, 19));
        let (tx, mut rx) = mpsc::channel(8);
        let watcher = EventWatcher::new(chain.clone(), &Config::for_tests(), tx);

        assert_eq!(watcher.scan_once().await.unwrap(), 1);
        assert_eq!(watcher.last_block().await, Some(20));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.event, ChainEvent::AreaBombed { radius: 3, .. }));

        // nothing new at the same head
        assert_eq!(watcher.scan_once().await.unwrap(), 0);
        assert_eq!(chain.log_queries(), vec![(5, 20)]);
    }

    #[tokio::test]
    async fn failed_scan_keeps_position() {
        let chain = Arc::new(MockChain::connected());
        chain.set_block_number(50);
        chain.fail_logs_once("gateway timeout");
        let (tx, _rx) = mpsc::channel(8);
        let watcher = EventWatcher::new(chain.clone(), &Config::for_tests(), tx);

        assert!(watcher.scan_once().await.is_err());
        assert_eq!(watcher.last_block().await, None);
        watcher.scan_once().await.unwrap();
        assert_eq!(watcher.last_block().await, Some(50));
    }
}
