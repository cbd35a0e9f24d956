//! Scripted in-memory `JobsPort` for poller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use roe_common::CancelContext;
use roe_domain::{
    AgentDatum, JobResult, JobResultBatchEntry, JobStatus, JobStatusBatchEntry, JobStatusInfo,
    Result, RoeError,
};
use serde_json::json;

use super::ports::JobsPort;

/// Each job walks through its scripted statuses, one per status query, and
/// then keeps reporting the last one.
#[derive(Default)]
pub struct ScriptedJobs {
    scripts: Mutex<HashMap<String, VecDeque<JobStatus>>>,
    /// Ids dropped from batch result responses.
    omit_results: Vec<String>,
    /// When set, batch results come back in this order.
    result_order: Option<Vec<String>>,
    pub status_calls: AtomicUsize,
    pub result_calls: AtomicUsize,
    pub queried_status_ids: Mutex<Vec<Vec<String>>>,
}

impl ScriptedJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, job_id: &str, statuses: &[JobStatus]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(job_id.to_owned(), statuses.iter().copied().collect());
        self
    }

    pub fn omit_result(mut self, job_id: &str) -> Self {
        self.omit_results.push(job_id.to_owned());
        self
    }

    pub fn result_order(mut self, order: &[&str]) -> Self {
        self.result_order = Some(order.iter().map(|s| (*s).to_owned()).collect());
        self
    }

    fn next_status(&self, job_id: &str) -> Option<JobStatus> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(job_id)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        }
    }

    pub fn output_for(job_id: &str) -> AgentDatum {
        AgentDatum {
            key: "answer".to_owned(),
            data_type: "text/plain".to_owned(),
            value: format!("output of {job_id}"),
            ..AgentDatum::default()
        }
    }

    fn result_for(job_id: &str) -> JobResult {
        JobResult {
            agent_id: "agent-1".to_owned(),
            agent_version_id: "version-1".to_owned(),
            outputs: vec![Self::output_for(job_id)],
            ..JobResult::default()
        }
    }

    fn entry_for(job_id: &str) -> JobResultBatchEntry {
        let datum = Self::output_for(job_id);
        JobResultBatchEntry {
            id: job_id.to_owned(),
            agent_id: Some("agent-1".to_owned()),
            agent_version_id: Some("version-1".to_owned()),
            result: Some(json!([{
                "key": datum.key,
                "description": "",
                "data_type": datum.data_type,
                "value": datum.value,
            }])),
            ..JobResultBatchEntry::default()
        }
    }
}

#[async_trait]
impl JobsPort for ScriptedJobs {
    async fn retrieve_status(&self, ctx: &CancelContext, job_id: &str) -> Result<JobStatusInfo> {
        ctx.check()?;
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .next_status(job_id)
            .ok_or_else(|| RoeError::JobNotFound { job_id: job_id.to_owned() })?;
        Ok(JobStatusInfo { status, ..JobStatusInfo::default() })
    }

    async fn retrieve_result(&self, ctx: &CancelContext, job_id: &str) -> Result<JobResult> {
        ctx.check()?;
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::result_for(job_id))
    }

    async fn retrieve_status_many(
        &self,
        ctx: &CancelContext,
        job_ids: &[String],
    ) -> Result<Vec<JobStatusBatchEntry>> {
        ctx.check()?;
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.queried_status_ids.lock().unwrap().push(job_ids.to_vec());
        Ok(job_ids
            .iter()
            .map(|id| JobStatusBatchEntry {
                id: id.clone(),
                status: self.next_status(id),
                ..JobStatusBatchEntry::default()
            })
            .collect())
    }

    async fn retrieve_result_many(
        &self,
        ctx: &CancelContext,
        job_ids: &[String],
    ) -> Result<Vec<JobResultBatchEntry>> {
        ctx.check()?;
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        let mut ids: Vec<&String> =
            job_ids.iter().filter(|id| !self.omit_results.contains(id)).collect();
        if let Some(order) = &self.result_order {
            ids.sort_by_key(|id| order.iter().position(|o| o == *id).unwrap_or(usize::MAX));
        }
        Ok(ids.into_iter().map(|id| Self::entry_for(id)).collect())
    }
}
