//! Per-send capture slot

use mailer_log_common::types::TrackingId;
use mailer_log_storage::models::CreateEmail;

/// Snapshot of an outbound message taken before it is handed to the transport
#[derive(Debug, Clone)]
pub struct EmailCapture {
    pub tracking_id: TrackingId,
    pub email: CreateEmail,
}

/// Carries the capture of one send from interception to delivery recording.
///
/// Owned by the send operation; whatever is left in it is discarded when it
/// goes out of scope.
#[derive(Debug, Default)]
pub struct SendContext {
    capture: Option<EmailCapture>,
}

impl SendContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the capture for this send, replacing any previous one
    pub fn begin(&mut self, capture: EmailCapture) {
        self.capture = Some(capture);
    }

    /// Remove and return the capture
    pub fn take(&mut self) -> Option<EmailCapture> {
        self.capture.take()
    }

    pub fn tracking_id(&self) -> Option<TrackingId> {
        self.capture.as_ref().map(|c| c.tracking_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailer_log_common::EmailStatus;
    use uuid::Uuid;

    #[test]
    fn test_take_empties_the_slot() {
        let tracking_id = Uuid::new_v4();
        let mut ctx = SendContext::new();
        ctx.begin(EmailCapture {
            tracking_id,
            email: CreateEmail::new(tracking_id, EmailStatus::Pending),
        });

        assert_eq!(ctx.tracking_id(), Some(tracking_id));
        assert!(ctx.take().is_some());
        assert!(ctx.take().is_none());
        assert_eq!(ctx.tracking_id(), None);
    }
}
