//! Assignment notification dispatch.
//!
//! Notification is not on the critical path of data consistency: the
//! workflow engine only enqueues a notice and never awaits delivery. A
//! single worker task drains the queue and hands each notice to a
//! [`Mailer`]; failures are logged and swallowed.

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use taskhub_core::task::Task;

/// Summary of a task sent to a newly assigned member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentNotice {
    /// The assignee's email address.
    pub email: String,
    /// Task name.
    pub task_name: String,
    /// Task description.
    pub description: String,
    /// Planned start date.
    pub start_date: NaiveDate,
    /// Planned end date.
    pub end_date: NaiveDate,
    /// The most recent comment at assignment time, if any.
    pub latest_comment: Option<String>,
}

impl AssignmentNotice {
    /// Builds a notice for the given task, addressed to `email`.
    #[must_use]
    pub fn for_task(task: &Task, email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            task_name: task.name.clone(),
            description: task.description.clone(),
            start_date: task.start_date,
            end_date: task.end_date,
            latest_comment: task.latest_comment().map(ToString::to_string),
        }
    }

    /// Renders the plain-text mail body.
    #[must_use]
    pub fn body(&self) -> String {
        let mut body = format!(
            "You have been assigned the task \"{}\".\n\n{}\n\nStart: {}\nEnd: {}\n",
            self.task_name, self.description, self.start_date, self.end_date
        );
        if let Some(comment) = &self.latest_comment {
            body.push_str(&format!("\nLatest comment: {comment}\n"));
        }
        body
    }
}

/// Error returned by a mailer backend.
#[derive(Debug, thiserror::Error)]
#[error("mail send failed: {0}")]
pub struct MailerError(pub String);

/// Outbound mail backend.
///
/// SMTP delivery is an external collaborator; the server only needs a
/// fire-and-forget sink. Tests inject a recording implementation.
pub trait Mailer: Send + Sync + 'static {
    /// Sends one assignment notice.
    fn send(
        &self,
        notice: &AssignmentNotice,
    ) -> impl std::future::Future<Output = Result<(), MailerError>> + Send;
}

/// Default mailer: logs the outbound mail instead of speaking SMTP.
#[derive(Debug, Clone)]
pub struct TracingMailer {
    /// Sender address recorded in the log line.
    pub from: String,
}

impl Mailer for TracingMailer {
    async fn send(&self, notice: &AssignmentNotice) -> Result<(), MailerError> {
        tracing::info!(
            from = %self.from,
            to = %notice.email,
            task = %notice.task_name,
            "assignment notification"
        );
        tracing::debug!(body = %notice.body(), "assignment notification body");
        Ok(())
    }
}

/// Handle to the spawned notification worker.
pub struct NotificationDispatcher {
    handle: JoinHandle<()>,
}

impl NotificationDispatcher {
    /// Spawns the worker task and returns the queue sender plus the
    /// dispatcher handle.
    ///
    /// The worker runs until every sender is dropped. Mailer failures are
    /// logged and never surfaced to the producer.
    #[must_use]
    pub fn spawn<M: Mailer>(mailer: M) -> (mpsc::UnboundedSender<AssignmentNotice>, Self) {
        let (tx, mut rx) = mpsc::unbounded_channel::<AssignmentNotice>();
        let handle = tokio::spawn(async move {
            while let Some(notice) = rx.recv().await {
                if let Err(e) = mailer.send(&notice).await {
                    tracing::warn!(
                        to = %notice.email,
                        task = %notice.task_name,
                        error = %e,
                        "assignment notification failed"
                    );
                }
            }
        });
        (tx, Self { handle })
    }

    /// Aborts the worker task.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}
