//! Signed-in user session and its liveness.
//!
//! Sync work started under a session checks [`Session::is_live`] before
//! applying results, so a push that completes after sign-out does not write
//! into the next user's state.

use ledger_engine::RecordKind;
use std::sync::atomic::{AtomicBool, Ordering};

/// The user whose records are being synchronized.
#[derive(Debug)]
pub struct Session {
    user_id: String,
    live: AtomicBool,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            live: AtomicBool::new(true),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Mark the session over. Idempotent.
    pub fn end(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            tracing::info!(user_id = %self.user_id, "Session ended");
        }
    }

    /// Remote path of this user's collection for a record kind.
    pub fn collection_path(&self, kind: RecordKind) -> crate::remote::CollectionPath {
        crate::remote::CollectionPath::for_user(&self.user_id, kind)
    }
}
