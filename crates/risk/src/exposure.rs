use std::sync::Arc;

use tracing::{debug, info};

use common::{ExposureQuery, Result};

/// Whether an instrument already carries a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    Flat,
    Open,
}

/// Vetoes new entries while a position is open on the same instrument.
///
/// Asks the venue on every call; nothing is cached between cycles, so a
/// position closed by its stop or target is seen as flat on the next check.
#[derive(Clone)]
pub struct ExposureGuard {
    query: Arc<dyn ExposureQuery>,
}

impl ExposureGuard {
    pub fn new(query: Arc<dyn ExposureQuery>) -> Self {
        Self { query }
    }

    /// A failed query propagates; callers must not treat it as flat.
    pub async fn check(&self, symbol: &str) -> Result<Exposure> {
        if self.query.has_open_position(symbol).await? {
            info!(symbol = %symbol, "Position already open, entry vetoed");
            Ok(Exposure::Open)
        } else {
            debug!(symbol = %symbol, "No open position");
            Ok(Exposure::Flat)
        }
    }
}
