use std::sync::Arc;

use crate::error::{Result, ServiceError};
use crate::session::Session;
use crate::store::{Link, LinkStore};

/// Binds a single-use captcha answer to one verification attempt and
/// checks the caller's ownership credential for a link.
pub struct SessionGuard {
    links: Arc<dyn LinkStore>,
}

impl SessionGuard {
    pub fn new(links: Arc<dyn LinkStore>) -> Self {
        Self { links }
    }

    /// Checks `supplied` against the session's stored captcha answer.
    ///
    /// Explicit three-step protocol: read the stored answer, consume it,
    /// compare case-sensitively. The answer is consumed on every attempt,
    /// pass or fail, so it can never be replayed; a retry needs a fresh
    /// challenge.
    pub async fn verify_captcha(&self, session: &Session, supplied: &str) -> Result<()> {
        let stored = session.captcha().await?;

        if stored.is_some() {
            session.clear_captcha().await?;
        }

        match stored {
            Some(ref answer) if answer == supplied => Ok(()),
            _ => Err(ServiceError::CaptchaMismatch),
        }
    }

    /// Full authorization sequence for a management operation, strict
    /// order, short-circuit on first failure:
    ///
    /// 1. captcha check (consumes the stored answer)
    /// 2. link lookup by hash
    /// 3. credential comparison against the stored owner token
    pub async fn verify(
        &self,
        session: &Session,
        supplied_captcha: &str,
        hash: &str,
        supplied_credential: &str,
    ) -> Result<Link> {
        self.verify_captcha(session, supplied_captcha).await?;

        // The captcha is gone either way from here on; a missing hash needs
        // no extra invalidation.
        let link = self.links.find(hash).ok_or(ServiceError::NotFound)?;

        if link.token != supplied_credential {
            session.clear_captcha().await?;
            tracing::warn!(
                target: "linkshortener::auth",
                session = %session.id(),
                hash = %hash,
                "credential mismatch"
            );
            return Err(ServiceError::CredentialMismatch);
        }

        Ok(link)
    }
}
