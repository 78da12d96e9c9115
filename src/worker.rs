//! Mail poll worker — drives the pipeline over the mail channel.
//!
//! Each cycle fetches a batch of unseen messages and walks them in order:
//! duplicates and empty messages are marked seen and skipped, successes are
//! persisted, answered and marked seen, stage failures leave the message
//! unseen for one retry on the next poll. Only a ledger write failure aborts
//! a cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, PipelineError};
use crate::mail::{MailSender, MailSource};
use crate::pipeline::processor::TicketProcessor;
use crate::pipeline::types::TicketRecord;
use crate::store::TicketStore;

/// Hard cap on messages per poll cycle.
const MAX_BATCH: usize = 10;
/// Pause after a failed cycle before the loop resumes.
const CYCLE_BACKOFF: Duration = Duration::from_secs(10);

pub struct PollWorker {
    source: Arc<dyn MailSource>,
    sender: Arc<dyn MailSender>,
    store: Arc<dyn TicketStore>,
    processor: TicketProcessor,
    batch_limit: usize,
}

impl PollWorker {
    pub fn new(
        source: Arc<dyn MailSource>,
        sender: Arc<dyn MailSender>,
        store: Arc<dyn TicketStore>,
        processor: TicketProcessor,
        batch_limit: usize,
    ) -> Self {
        Self {
            source,
            sender,
            store,
            processor,
            batch_limit: batch_limit.min(MAX_BATCH),
        }
    }

    /// Run one poll cycle. Only fetch and ledger failures abort it; every
    /// other error is logged and the batch moves on.
    pub async fn run_cycle(&mut self, stop: &AtomicBool) -> Result<(), Error> {
        let messages = self.source.fetch_unseen(self.batch_limit).await?;
        if messages.is_empty() {
            debug!("No unseen messages");
            return Ok(());
        }
        info!(count = messages.len(), "Fetched unseen messages");

        for raw in &messages {
            if stop.load(Ordering::Relaxed) {
                info!("Stop requested, leaving remaining messages unseen");
                return Ok(());
            }

            if self.processor.is_processed(&raw.id) {
                debug!(id = %raw.id, "Already processed, marking seen");
                self.mark_seen(&raw.id).await;
                continue;
            }

            match self.processor.process(raw).await {
                Ok(Some(record)) => {
                    self.persist(&record).await;
                    self.send_reply(&record).await;
                    self.mark_seen(&raw.id).await;
                }
                Ok(None) => {
                    // Empty body; nothing to answer.
                    self.mark_seen(&raw.id).await;
                }
                Err(PipelineError::Ledger(e)) => {
                    error!(id = %raw.id, error = %e, "Ledger write failed, aborting cycle");
                    return Err(PipelineError::Ledger(e).into());
                }
                Err(e) => {
                    warn!(id = %raw.id, error = %e, "Processing failed, message stays unseen");
                }
            }
        }

        Ok(())
    }

    async fn persist(&self, record: &TicketRecord) {
        if let Err(e) = self.store.append(record).await {
            error!(id = %record.message_id, error = %e, "Store append failed");
        }
    }

    /// Delivery failure is logged only; the message is still marked seen and
    /// never reprocessed.
    async fn send_reply(&self, record: &TicketRecord) {
        let Some(to) = record.email.as_deref() else {
            warn!(id = %record.message_id, "No recipient address, reply not sent");
            return;
        };

        if let Err(e) = self
            .sender
            .send(to, &record.reply.subject, &record.reply.body)
            .await
        {
            warn!(id = %record.message_id, error = %e, "Reply delivery failed");
        }
    }

    async fn mark_seen(&self, id: &str) {
        if let Err(e) = self.source.mark_seen(id).await {
            warn!(id = %id, error = %e, "Could not mark message seen");
        }
    }
}

/// Spawn the poll loop. Returns a `JoinHandle` and a shutdown flag.
pub fn spawn_worker(
    mut worker: PollWorker,
    poll_interval_secs: u64,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(interval_secs = poll_interval_secs, "Mail worker started");

        let mut tick = tokio::time::interval(Duration::from_secs(poll_interval_secs));

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Mail worker shutting down");
                return;
            }

            if let Err(e) = worker.run_cycle(&shutdown).await {
                error!(error = %e, "Poll cycle failed");
                tokio::time::sleep(CYCLE_BACKOFF).await;
            }
        }
    });

    (handle, shutdown_flag)
}

// ── Tests ───────────────────────────────────────────────────────────
