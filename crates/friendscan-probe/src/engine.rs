// ABOUTME: Batch-by-batch probe orchestration over one reused group chat
// ABOUTME: Create or extend the group, collect former friends, empty the group, repeat

use friendscan_core::{partition, Batch, Contact, EligibilityFilter, FindingSet, ProbeConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::ProbeApi;
use crate::clock::Sleeper;
use crate::error::{ProbeError, Result};
use crate::progress::{NoProgress, ProgressSink, ProgressUpdate};
use crate::retry::{with_retry, RetryOutcome, RetryPolicy};

pub const OP_CREATE_GROUP: &str = "create group";
pub const OP_ADD_MEMBERS: &str = "add members";
pub const OP_REMOVE_MEMBERS: &str = "remove members";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub batch_size: usize,
    /// Fixed pause before every batch but the first
    pub inter_batch_delay: Duration,
    pub retry: RetryPolicy,
}

impl ProbeSettings {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            inter_batch_delay: config.inter_batch_delay(),
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// One group-chat call that needed retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRecord {
    pub batch: usize,
    pub operation: &'static str,
    pub retries: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub findings: FindingSet,
    /// The probe group, left on the platform once the run ends
    pub group_id: Option<String>,
    pub eligible: usize,
    pub batches: usize,
    pub retries: Vec<RetryRecord>,
}

impl ProbeReport {
    pub fn retries_for(&self, batch: usize, operation: &str) -> u32 {
        self.retries
            .iter()
            .filter(|r| r.batch == batch && r.operation == operation)
            .map(|r| r.retries)
            .sum()
    }

    pub fn total_retries(&self) -> u32 {
        self.retries.iter().map(|r| r.retries).sum()
    }
}

/// State owned by a single run.
struct RunContext {
    eligible: usize,
    batches: usize,
    processed: usize,
    group_id: Option<String>,
    findings: FindingSet,
    retries: Vec<RetryRecord>,
}

impl RunContext {
    fn new(eligible: usize, batches: usize) -> Self {
        Self {
            eligible,
            batches,
            processed: 0,
            group_id: None,
            findings: FindingSet::new(),
            retries: Vec::new(),
        }
    }

    fn note_retries<T>(
        &mut self,
        batch: usize,
        operation: &'static str,
        outcome: RetryOutcome<T>,
    ) -> T {
        if outcome.retries > 0 {
            self.retries.push(RetryRecord {
                batch,
                operation,
                retries: outcome.retries,
            });
        }
        outcome.value
    }

    /// Echoed members flagged as former friends, labelled from the snapshot
    /// when the id is known there.
    fn collect_findings(&mut self, batch: &Batch, members: &[Contact]) {
        for member in members.iter().filter(|m| m.is_former_friend()) {
            let contact = batch.find(&member.id).unwrap_or(member);
            debug!(id = %member.id, "former friend found");
            self.findings.record(contact);
        }
    }

    fn progress(&self, batch: usize) -> ProgressUpdate {
        ProgressUpdate {
            batch,
            batches: self.batches,
            processed: self.processed,
            total: self.eligible,
            findings: self.findings.len(),
        }
    }

    fn into_report(self) -> ProbeReport {
        ProbeReport {
            findings: self.findings,
            group_id: self.group_id,
            eligible: self.eligible,
            batches: self.batches,
            retries: self.retries,
        }
    }
}

/// Sequential probe over the contact snapshot.
pub struct ProbeEngine {
    api: Arc<dyn ProbeApi>,
    sleeper: Arc<dyn Sleeper>,
    progress: Arc<dyn ProgressSink>,
    settings: ProbeSettings,
}

impl ProbeEngine {
    pub fn new(api: Arc<dyn ProbeApi>, sleeper: Arc<dyn Sleeper>, settings: ProbeSettings) -> Self {
        Self {
            api,
            sleeper,
            progress: Arc::new(NoProgress),
            settings,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Probe every eligible contact. Any call that exhausts its retries
    /// aborts the run; findings gathered so far are dropped with it.
    pub async fn run(&self, self_id: &str, contacts: &[Contact]) -> Result<ProbeReport> {
        if self.settings.batch_size == 0 {
            return Err(ProbeError::InvalidSettings("batch size must be positive".into()));
        }

        let eligible = EligibilityFilter::new(self_id).filter(contacts);
        if eligible.is_empty() {
            info!("No eligible contacts to probe");
            return Ok(ProbeReport::default());
        }

        let batches = partition(&eligible, self.settings.batch_size)?;
        info!(
            "Probing {} of {} contacts in {} batches of up to {}",
            eligible.len(),
            contacts.len(),
            batches.len(),
            self.settings.batch_size
        );

        let mut ctx = RunContext::new(eligible.len(), batches.len());
        for batch in &batches {
            self.probe_batch(&mut ctx, batch).await?;
        }

        info!("Probe finished: {} former friends found", ctx.findings.len());
        Ok(ctx.into_report())
    }

    async fn probe_batch(&self, ctx: &mut RunContext, batch: &Batch) -> Result<()> {
        if !batch.is_first() {
            debug!(
                "Waiting {:?} before batch {}",
                self.settings.inter_batch_delay,
                batch.index + 1
            );
            self.sleeper.sleep(self.settings.inter_batch_delay).await;
        }

        let ids = batch.ids();
        let policy = &self.settings.retry;
        let sleeper = self.sleeper.as_ref();
        let api = self.api.as_ref();

        let (group_id, members) = match ctx.group_id.clone() {
            None => {
                let outcome =
                    with_retry(OP_CREATE_GROUP, policy, sleeper, || api.create_group(&ids)).await?;
                let snapshot = ctx.note_retries(batch.index, OP_CREATE_GROUP, outcome);
                info!("Created probe group {}", snapshot.group_id);
                ctx.group_id = Some(snapshot.group_id.clone());
                (snapshot.group_id, snapshot.members)
            }
            Some(group_id) => {
                let outcome = with_retry(OP_ADD_MEMBERS, policy, sleeper, || {
                    api.add_members(&group_id, &ids)
                })
                .await?;
                let members = ctx.note_retries(batch.index, OP_ADD_MEMBERS, outcome);
                (group_id, members)
            }
        };

        ctx.collect_findings(batch, &members);

        let outcome = with_retry(OP_REMOVE_MEMBERS, policy, sleeper, || {
            api.remove_members(&group_id, &ids)
        })
        .await?;
        ctx.note_retries(batch.index, OP_REMOVE_MEMBERS, outcome);

        ctx.processed += batch.len();
        self.progress.report(&ctx.progress(batch.index));
        Ok(())
    }
}
