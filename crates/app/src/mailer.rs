use metrics::counter;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A single welcome email waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeEmail {
    pub email: String,
}

/// Cloneable sending half of the mailer queue, held by the HTTP state.
#[derive(Clone)]
pub struct MailerHandle {
    tx: mpsc::UnboundedSender<WelcomeEmail>,
}

impl MailerHandle {
    /// Hands a welcome email to the background worker.
    ///
    /// Fire and forget: the handler's responsibility ends at the handoff,
    /// so a closed worker drops the job without surfacing an error.
    pub fn enqueue(&self, job: WelcomeEmail) {
        counter!("welcome_email_enqueued_total").increment(1);
        if self.tx.send(job).is_err() {
            warn!(stage = "mailer", "mailer worker is gone; welcome email dropped");
        }
    }
}

/// Background worker draining the welcome email queue.
pub struct MailerWorker {
    rx: mpsc::UnboundedReceiver<WelcomeEmail>,
}

/// Creates a connected handle/worker pair.
pub fn mailer_channel() -> (MailerHandle, MailerWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MailerHandle { tx }, MailerWorker { rx })
}

impl MailerWorker {
    /// Runs the worker loop on its own task.
    ///
    /// The loop ends once every handle has been dropped and the queue is
    /// drained.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop().await;
        })
    }

    async fn run_loop(mut self) {
        while let Some(job) = self.rx.recv().await {
            deliver(&job);
        }
    }

    #[cfg(test)]
    pub(crate) fn try_next(&mut self) -> Option<WelcomeEmail> {
        self.rx.try_recv().ok()
    }
}

/// Delivery stub: emits the log line instead of talking to a mail relay.
fn deliver(job: &WelcomeEmail) {
    info!(stage = "mailer", "{}", delivery_line(&job.email));
    counter!("welcome_email_sent_total").increment(1);
}

fn delivery_line(email: &str) -> String {
    format!("Welcome email sent to {email}")
}
