use std::sync::Arc;

use crate::auth::SessionGuard;
use crate::error::{Result, ServiceError};
use crate::session::Session;
use crate::store::{AccessLogStore, Link, LinkStore};

/// Authorized link lifecycle operations: creation and deletion.
pub struct LinkManager {
    guard: Arc<SessionGuard>,
    links: Arc<dyn LinkStore>,
    access_log: Arc<dyn AccessLogStore>,
}

impl LinkManager {
    pub fn new(
        guard: Arc<SessionGuard>,
        links: Arc<dyn LinkStore>,
        access_log: Arc<dyn AccessLogStore>,
    ) -> Self {
        Self {
            guard,
            links,
            access_log,
        }
    }

    /// Creates a short link after a captcha check.
    ///
    /// The supplied password becomes the owner credential for later
    /// management calls. Hash assignment is delegated to the caller's
    /// generator so the strategy stays pluggable.
    pub async fn create_link(
        &self,
        session: &Session,
        captcha: &str,
        hash: String,
        url: String,
        password: String,
    ) -> Result<Link> {
        self.guard.verify_captcha(session, captcha).await?;

        let link = Link {
            hash,
            url,
            token: password,
        };
        self.links.insert(link.clone());

        tracing::info!(
            target: "linkshortener::links",
            hash = %link.hash,
            "link created"
        );
        Ok(link)
    }

    /// Deletes a link after the full authorization sequence.
    ///
    /// The link's access-log records are cascaded away with it so the log
    /// never holds rows for an unreachable hash.
    pub async fn delete_link(
        &self,
        session: &Session,
        hash: &str,
        credential: &str,
        captcha: &str,
    ) -> Result<()> {
        self.guard.verify(session, captcha, hash, credential).await?;

        if !self.links.delete(hash) {
            // Lost a race with a concurrent deletion after verification.
            return Err(ServiceError::NotFound);
        }
        let dropped = self.access_log.delete_all(hash);

        tracing::info!(
            target: "linkshortener::links",
            hash = %hash,
            access_events_dropped = dropped,
            "link deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use crate::store::{LinkAccessEvent, MemoryAccessLogStore, MemoryLinkStore};

    struct Fixture {
        manager: LinkManager,
        links: Arc<MemoryLinkStore>,
        access_log: Arc<MemoryAccessLogStore>,
        session: Session,
    }

    fn fixture() -> Fixture {
        let links = Arc::new(MemoryLinkStore::new());
        links.insert(Link {
            hash: "abc123".into(),
            url: "https://example.com".into(),
            token: "s3cret".into(),
        });

        let access_log = Arc::new(MemoryAccessLogStore::new());
        access_log.append(LinkAccessEvent::now("abc123", "10.0.0.1", "test-agent"));
        access_log.append(LinkAccessEvent::now("abc123", "10.0.0.2", "test-agent"));

        let guard = Arc::new(SessionGuard::new(links.clone() as Arc<dyn LinkStore>));
        let manager = LinkManager::new(
            guard,
            links.clone() as Arc<dyn LinkStore>,
            access_log.clone() as Arc<dyn AccessLogStore>,
        );
        let session = Session::new("s1".into(), Arc::new(SessionStore::memory()));

        Fixture {
            manager,
            links,
            access_log,
            session,
        }
    }

    #[tokio::test]
    async fn test_delete_cascades_to_access_log() {
        let f = fixture();
        f.session.set_captcha("aB3x9Z").await.unwrap();

        f.manager
            .delete_link(&f.session, "abc123", "s3cret", "aB3x9Z")
            .await
            .unwrap();

        assert!(f.links.find("abc123").is_none());
        assert_eq!(f.access_log.count("abc123"), 0);
    }

    #[tokio::test]
    async fn test_delete_with_wrong_credential_leaves_link() {
        let f = fixture();
        f.session.set_captcha("aB3x9Z").await.unwrap();

        let err = f
            .manager
            .delete_link(&f.session, "abc123", "nope", "aB3x9Z")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CredentialMismatch));
        assert!(f.links.find("abc123").is_some());
        assert_eq!(f.access_log.count("abc123"), 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_hash() {
        let f = fixture();
        f.session.set_captcha("aB3x9Z").await.unwrap();

        let err = f
            .manager
            .delete_link(&f.session, "missing", "s3cret", "aB3x9Z")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[tokio::test]
    async fn test_create_requires_captcha() {
        let f = fixture();

        let err = f
            .manager
            .create_link(
                &f.session,
                "aB3x9Z",
                "fresh1".into(),
                "https://example.org".into(),
                "pw".into(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CaptchaMismatch));
        assert!(f.links.find("fresh1").is_none());

        f.session.set_captcha("aB3x9Z").await.unwrap();
        let link = f
            .manager
            .create_link(
                &f.session,
                "aB3x9Z",
                "fresh1".into(),
                "https://example.org".into(),
                "pw".into(),
            )
            .await
            .unwrap();
        assert_eq!(link.token, "pw");
        assert!(f.links.find("fresh1").is_some());
    }
}
