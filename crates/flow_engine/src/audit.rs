//! Operational audit channel
//!
//! Internal errors are reported here and never shown to the end user.

use async_trait::async_trait;
use band_core::{ChatId, Messenger, OutboundMessage, UserId};
use flow_state::FlowName;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where in the dispatch pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Load,
    Step,
    Save,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FailureStage::Load => "load",
            FailureStage::Step => "step",
            FailureStage::Save => "save",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub user_id: UserId,
    pub stage: FailureStage,
    /// Position the user was at when the message arrived, if known.
    pub position: Option<(FlowName, i32)>,
    pub error: String,
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {} failed at {}", self.user_id, self.stage)?;
        if let Some((flow, step)) = &self.position {
            write!(f, " in {flow}[{step}]")?;
        }
        write!(f, ": {}", self.error)
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn report(&self, report: AuditReport);
}

/// Writes reports to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAudit;

#[async_trait]
impl AuditSink for LogAudit {
    async fn report(&self, report: AuditReport) {
        tracing::error!(
            user_id = %report.user_id,
            stage = %report.stage,
            error = %report.error,
            "dispatch failed"
        );
    }
}

/// Forwards reports to an operations chat, and logs them as well.
pub struct ChannelAudit {
    messenger: Arc<dyn Messenger>,
    channel: ChatId,
}

impl ChannelAudit {
    pub fn new(messenger: Arc<dyn Messenger>, channel: ChatId) -> Self {
        Self { messenger, channel }
    }
}

#[async_trait]
impl AuditSink for ChannelAudit {
    async fn report(&self, report: AuditReport) {
        LogAudit.report(report.clone()).await;

        let text = format!("<code>{report}</code>");
        if let Err(error) = self
            .messenger
            .send(self.channel, OutboundMessage::text(text))
            .await
        {
            tracing::warn!(%error, "could not forward audit report");
        }
    }
}
