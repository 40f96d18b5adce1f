//! Agency session: uploads bets in batches and queries the winners.
//!
//! Every exchange runs on its own connection: dial, send one message, read
//! the reply, close. Batches go out strictly one after another, and the
//! confirmation for a batch is read before the next one is sent.

use tracing::Instrument;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::ipc::tcp::Dialer;
use crate::protocol::{Bet, CONFIRMATION_ACCEPTED, WinnersRequest, WinnersResponse, encode_batch};
use crate::records;
use crate::shutdown::Shutdown;

/// Outcome of a fully accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitSummary {
    pub batches: usize,
    pub bets: usize,
}

pub struct Client {
    config: ClientConfig,
    dialer: Dialer,
    shutdown: Shutdown,
}

impl Client {
    pub fn new(config: ClientConfig, shutdown: Shutdown) -> Self {
        let dialer = Dialer::new(config.server_address.clone(), shutdown.clone())
            .with_retry(config.connect_attempts, config.connect_backoff);
        Self {
            config,
            dialer,
            shutdown,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends every bet, `batch_size` at a time. Stops at the first batch that
    /// is not accepted, so a partial upload is always an error.
    pub async fn submit_bets(&self, bets: &[Bet]) -> Result<SubmitSummary, ClientError> {
        let span = tracing::info_span!("submit", agency = self.config.agency);
        async {
            let mut summary = SubmitSummary { batches: 0, bets: 0 };
            for (idx, batch) in records::batches(bets, self.config.batch_size as usize).enumerate() {
                let number = idx + 1;
                if let Err(e) = self.submit_batch(number, batch).await {
                    tracing::error!(
                        "action: batch_sent | result: fail | batch: {} | bets: {} | error: {}",
                        number,
                        batch.len(),
                        e
                    );
                    return Err(e);
                }
                tracing::info!(
                    "action: batch_sent | result: success | batch: {} | bets: {}",
                    number,
                    batch.len()
                );
                summary.batches += 1;
                summary.bets += batch.len();
            }

            if !self.config.post_submit_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.post_submit_delay) => {}
                    _ = self.shutdown.cancelled() => {}
                }
            }
            tracing::info!(
                "action: bets_submitted | result: success | batches: {} | bets: {}",
                summary.batches,
                summary.bets
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// One batch round-trip. `number` is 1-based and only used for reporting.
    pub async fn submit_batch(&self, number: usize, batch: &[Bet]) -> Result<(), ClientError> {
        if self.shutdown.is_triggered() {
            return Err(ClientError::Cancelled);
        }
        let payload = encode_batch(batch)?;

        let mut conn = self.dialer.connect(self.config.batch_timeout).await?;
        let res = async {
            conn.send(&payload).await?;
            conn.recv_u8("confirmation").await
        }
        .await;
        conn.close();

        match res? {
            CONFIRMATION_ACCEPTED => Ok(()),
            code => Err(ClientError::Rejected {
                batch: number,
                code,
            }),
        }
    }

    /// Asks the server for this agency's winning documents.
    pub async fn query_winners(&self) -> Result<WinnersResponse, ClientError> {
        let span = tracing::info_span!("winners", agency = self.config.agency);
        async {
            if self.shutdown.is_triggered() {
                return Err(ClientError::Cancelled);
            }
            let request = WinnersRequest::new(self.config.agency);

            let mut conn = self.dialer.connect(self.config.winners_timeout).await?;
            let res = async {
                conn.send(&request.encode()).await?;
                conn.read_winners().await
            }
            .await;
            conn.close();

            match &res {
                Ok(winners) => tracing::info!(
                    "action: winners_query | result: success | count: {}",
                    winners.count()
                ),
                Err(e) => tracing::error!("action: winners_query | result: fail | error: {}", e),
            }
            res
        }
        .instrument(span)
        .await
    }
}
