use tracing::info;

/// Outcome of one call to `fit`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Completed epochs, including the one that triggered early stopping.
    pub epochs: usize,
    /// `0.5 * Σ error²` of each completed epoch.
    pub losses: Vec<f64>,
    pub early_stopped: bool,
}

impl FitReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }
}

/// Receives training progress.
pub trait Progress {
    fn on_epoch(&mut self, epoch: usize, loss: f64);

    fn on_finish(&mut self, _report: &FitReport) {}
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_epoch(&mut self, _epoch: usize, _loss: f64) {}
}

/// Emits one `tracing` event per epoch and one when training ends.
#[derive(Debug, Clone)]
pub struct TracingProgress {
    model: String,
}

impl TracingProgress {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

impl Progress for TracingProgress {
    fn on_epoch(&mut self, epoch: usize, loss: f64) {
        info!(model = %self.model, epoch, loss, "epoch finished");
    }

    fn on_finish(&mut self, report: &FitReport) {
        info!(
            model = %self.model,
            epochs = report.epochs,
            early_stopped = report.early_stopped,
            final_loss = report.final_loss(),
            "training finished"
        );
    }
}
