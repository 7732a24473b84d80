//! Context shared by every stage of one item.

use canopy_common::{Error, Result};
use tokio_util::sync::CancellationToken;

use super::observer::ProgressObserver;

/// Borrowed run context passed explicitly into each stage.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    /// Where progress is reported.
    pub observer: &'a dyn ProgressObserver,
    /// Checked at stage boundaries; cancellation is soft.
    pub cancel: &'a CancellationToken,
}

impl<'a> StageContext<'a> {
    pub fn new(observer: &'a dyn ProgressObserver, cancel: &'a CancellationToken) -> Self {
        Self { observer, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(Error::Cancelled)` once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for StageContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
