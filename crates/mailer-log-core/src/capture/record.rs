//! Delivery recording

use super::context::SendContext;
use async_trait::async_trait;
use mailer_log_common::types::OwnerRef;
use mailer_log_common::{EmailStatus, Result};
use mailer_log_storage::models::{CreateEmail, Email};
use mailer_log_storage::repository::EmailRepository;
use tracing::{error, info, warn};

/// Resolves the entity accountable for an outbound email
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    async fn resolve_owner(&self, email: &CreateEmail) -> Result<Option<OwnerRef>>;
}

/// Persist the captured email after a successful send.
///
/// Never fails the send: every error is logged and `None` is returned.
pub async fn record_delivery(
    ctx: &mut SendContext,
    emails: &dyn EmailRepository,
    resolver: Option<&dyn OwnerResolver>,
) -> Option<Email> {
    let Some(capture) = ctx.take() else {
        warn!("No captured message to record");
        return None;
    };

    let mut input = capture.email;
    input.status = EmailStatus::Sent;

    if let Some(resolver) = resolver {
        match resolver.resolve_owner(&input).await {
            Ok(owner) => input.owner = owner,
            Err(e) => warn!(
                tracking_id = %capture.tracking_id,
                "Failed to resolve email owner: {}", e
            ),
        }
    }

    match emails.create(input).await {
        Ok(email) => {
            info!(email_id = %email.id, tracking_id = %email.tracking_id, "Recorded outbound email");
            Some(email)
        }
        Err(e) => {
            error!(tracking_id = %capture.tracking_id, "Failed to record outbound email: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::context::EmailCapture;
    use mailer_log_common::Error;
    use mailer_log_storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    struct DomainOwner;

    #[async_trait]
    impl OwnerResolver for DomainOwner {
        async fn resolve_owner(&self, email: &CreateEmail) -> Result<Option<OwnerRef>> {
            Ok(email
                .domain
                .as_ref()
                .map(|domain| OwnerRef::new("Organization", domain.clone())))
        }
    }

    struct BrokenResolver;

    #[async_trait]
    impl OwnerResolver for BrokenResolver {
        async fn resolve_owner(&self, _email: &CreateEmail) -> Result<Option<OwnerRef>> {
            Err(Error::Internal("lookup failed".to_string()))
        }
    }

    fn context(domain: Option<&str>) -> SendContext {
        let tracking_id = Uuid::new_v4();
        let mut email = CreateEmail::new(tracking_id, EmailStatus::Pending);
        email.domain = domain.map(str::to_string);
        let mut ctx = SendContext::new();
        ctx.begin(EmailCapture { tracking_id, email });
        ctx
    }

    #[tokio::test]
    async fn test_records_sent_email_with_owner() {
        let store = MemoryStore::new();
        let mut ctx = context(Some("acme.test"));

        let email = record_delivery(&mut ctx, &store, Some(&DomainOwner as &dyn OwnerResolver))
            .await
            .unwrap();

        assert_eq!(email.status, "sent");
        assert_eq!(email.owner(), Some(OwnerRef::new("Organization", "acme.test")));
        assert!(ctx.take().is_none());
    }

    #[tokio::test]
    async fn test_resolver_failure_leaves_owner_unset() {
        let store = MemoryStore::new();
        let mut ctx = context(Some("acme.test"));

        let email = record_delivery(&mut ctx, &store, Some(&BrokenResolver as &dyn OwnerResolver))
            .await
            .unwrap();
        assert_eq!(email.owner(), None);
    }

    #[tokio::test]
    async fn test_storage_failure_is_swallowed() {
        let store = MemoryStore::new();
        let mut first = context(None);
        let tracking_id = first.tracking_id().unwrap();
        record_delivery(&mut first, &store, None).await.unwrap();

        // Same tracking id again violates uniqueness
        let mut second = SendContext::new();
        second.begin(EmailCapture {
            tracking_id,
            email: CreateEmail::new(tracking_id, EmailStatus::Pending),
        });
        assert!(record_delivery(&mut second, &store, None).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_context() {
        let store = MemoryStore::new();
        assert!(record_delivery(&mut SendContext::new(), &store, None)
            .await
            .is_none());
    }
}
