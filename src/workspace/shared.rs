//! A workspace shared between an edit thread and a build thread.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::base::DocumentId;

use super::builder::{BuildOutcome, Workspace};
use super::document::BuildState;

/// Serializes edits and builds over one [`Workspace`].
///
/// Every edit first cancels the build in flight, so an edit never waits
/// longer than the current document of the current phase.
pub struct SharedWorkspace {
    workspace: Mutex<Workspace>,
    in_flight: Mutex<CancellationToken>,
}

impl std::fmt::Debug for SharedWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedWorkspace").finish_non_exhaustive()
    }
}

impl SharedWorkspace {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace: Mutex::new(workspace),
            in_flight: Mutex::new(CancellationToken::new()),
        }
    }

    /// Cancels the build in flight, if any.
    pub fn cancel_build(&self) {
        self.in_flight.lock().cancel();
    }

    pub fn open(&self, uri: impl Into<String>, text: &str) -> DocumentId {
        self.cancel_build();
        self.workspace.lock().open(uri, text)
    }

    pub fn update(&self, uri: &str, text: &str) -> Option<DocumentId> {
        self.cancel_build();
        self.workspace.lock().update(uri, text)
    }

    pub fn close(&self, uri: &str) -> bool {
        self.cancel_build();
        self.workspace.lock().close(uri)
    }

    /// Builds `uris` to `target`, cancellable through [`Self::cancel_build`].
    pub fn build<I, S>(&self, uris: I, target: BuildState) -> BuildOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.build_with(uris, target, &CancellationToken::new())
    }

    /// Like [`Self::build`], also stopping when `cancel` fires.
    pub fn build_with<I, S>(&self, uris: I, target: BuildState, cancel: &CancellationToken) -> BuildOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let token = cancel.child_token();
        *self.in_flight.lock() = token.clone();
        let mut workspace = self.workspace.lock();
        workspace.request_build(uris, target, &token)
    }

    /// Runs `f` against the workspace once no edit or build holds it.
    pub fn read<R>(&self, f: impl FnOnce(&Workspace) -> R) -> R {
        f(&self.workspace.lock())
    }
}
