//! Mock conversion strategy for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::converter::{ConversionJob, ConversionStrategy, ConverterError, FailureKind};

/// What a [`MockStrategy`] does when executed.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Writes `content` to the target and reports 100.
    Succeed { content: Vec<u8> },
    /// Writes a partial target, then fails with `kind`.
    Fail { kind: FailureKind },
    /// Panics with the message.
    Panic(String),
    /// Writes a partial target, then waits for cancellation.
    WaitForCancel,
}

/// Mock implementation of the ConversionStrategy trait.
///
/// Provides controllable behavior for testing:
/// - Track executed jobs for assertions
/// - Simulate success, failure, panics and cancellation
#[derive(Debug, Clone)]
pub struct MockStrategy {
    behaviour: MockBehaviour,
    executed: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockStrategy {
    pub fn new(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            executed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(MockBehaviour::Succeed {
            content: b"mock output".to_vec(),
        })
    }

    /// Targets of every job executed so far.
    pub async fn executed_targets(&self) -> Vec<PathBuf> {
        self.executed.read().await.clone()
    }
}

#[async_trait]
impl ConversionStrategy for MockStrategy {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        self.executed.write().await.push(job.target().to_path_buf());

        match &self.behaviour {
            MockBehaviour::Succeed { content } => {
                tokio::fs::write(job.target(), content).await?;
                job.progress.complete();
                Ok(())
            }
            MockBehaviour::Fail { kind } => {
                tokio::fs::write(job.target(), b"partial").await?;
                job.progress.report(40);
                Err(ConverterError::library(*kind, "mock failure"))
            }
            MockBehaviour::Panic(message) => panic!("{message}"),
            MockBehaviour::WaitForCancel => {
                tokio::fs::write(job.target(), b"partial").await?;
                job.progress.report(10);
                job.cancellation().cancelled().await;
                Err(ConverterError::Cancelled)
            }
        }
    }
}
