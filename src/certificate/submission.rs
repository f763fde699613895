use std::sync::Arc;

use tokio::sync::Mutex;

use super::session::{CompletionOutcome, FormSession, SessionError};
use crate::remote::{save_event, EventApi, RetryPolicy};

/// A session shared between the field-change handler and in-flight submissions.
pub type SharedSession = Arc<Mutex<FormSession>>;

pub fn share(session: FormSession) -> SharedSession {
    Arc::new(Mutex::new(session))
}

/// Saves the certificate through `api`, retrying transient failures.
///
/// The session lock is released while the request is in flight, so a newer
/// submission may start meanwhile; this attempt's response is then stale and
/// leaves the session untouched.
pub async fn submit(
    session: &SharedSession,
    api: &dyn EventApi,
    policy: &RetryPolicy,
) -> Result<CompletionOutcome, SessionError> {
    let ticket = session.lock().await.begin_submission()?;
    let response = save_event(api, &ticket.record, policy).await;
    Ok(session
        .lock()
        .await
        .complete_submission(ticket.attempt, response))
}
