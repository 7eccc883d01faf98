use chrono::{NaiveDateTime, Utc};

use cdr_model::{DimensionMap, PipelineConfig};
use cdr_transform::CancelFlag;

/// Everything a run reads but never changes.
#[derive(Debug, Clone)]
pub struct RunContext<'a> {
    pub config: &'a PipelineConfig,
    pub dims: &'a DimensionMap,
    /// UTC. Stamped as the creation time of every record and used for
    /// missing timestamp columns.
    pub started_at: NaiveDateTime,
    pub cancel: CancelFlag,
}

impl<'a> RunContext<'a> {
    pub fn new(config: &'a PipelineConfig, dims: &'a DimensionMap) -> Self {
        Self {
            config,
            dims,
            started_at: Utc::now().naive_utc(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_started_at(mut self, started_at: NaiveDateTime) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_run_starts_in_utc() {
        let config = PipelineConfig::default();
        let dims = DimensionMap::new();
        let before = Utc::now().naive_utc();
        let ctx = RunContext::new(&config, &dims);
        let after = Utc::now().naive_utc();
        assert!(ctx.started_at >= before && ctx.started_at <= after);
        assert!(after - before < TimeDelta::seconds(5));
    }
}
