//! Patience-based early stopping on validation loss.

use std::ops::Range;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStoppingDecision {
    /// New best; snapshot the weights.
    Improved,
    Continue,
    /// `patience` consecutive epochs without improvement.
    Stop,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f32,
    best: Option<f32>,
    best_epoch: Option<usize>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            min_delta: 0.0,
            best: None,
            best_epoch: None,
            wait: 0,
        }
    }

    pub fn with_min_delta(mut self, min_delta: f32) -> Self {
        self.min_delta = min_delta.max(0.0);
        self
    }

    /// Record one epoch's validation loss. Non-finite losses never count as improvement.
    pub fn observe(&mut self, epoch: usize, val_loss: f32) -> EarlyStoppingDecision {
        let improved = val_loss.is_finite()
            && self
                .best
                .map_or(true, |best| val_loss < best - self.min_delta);
        if improved {
            self.best = Some(val_loss);
            self.best_epoch = Some(epoch);
            self.wait = 0;
            return EarlyStoppingDecision::Improved;
        }
        self.wait += 1;
        if self.wait >= self.patience {
            EarlyStoppingDecision::Stop
        } else {
            EarlyStoppingDecision::Continue
        }
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    /// Consecutive non-improving epochs observed so far.
    pub fn wait(&self) -> usize {
        self.wait
    }
}

/// Outcome of [`run_monitored`].
#[derive(Debug)]
pub struct MonitoredRun<M> {
    /// Best snapshot, or the last model when no epoch improved.
    pub model: M,
    pub stopped_early: bool,
}

/// Run `epochs` through `step`, which trains one epoch and returns the updated model
/// and its validation loss. The model is snapshotted on every improvement and the best
/// snapshot is returned once the range ends or patience runs out.
pub fn run_monitored<M, E, F>(
    mut model: M,
    epochs: Range<usize>,
    stopper: &mut EarlyStopping,
    mut step: F,
) -> Result<MonitoredRun<M>, E>
where
    M: Clone,
    F: FnMut(M, usize) -> Result<(M, f32), E>,
{
    let mut best_model: Option<M> = None;
    let mut stopped_early = false;
    for epoch in epochs {
        let (next, val_loss) = step(model, epoch)?;
        model = next;
        match stopper.observe(epoch, val_loss) {
            EarlyStoppingDecision::Improved => best_model = Some(model.clone()),
            EarlyStoppingDecision::Continue => {}
            EarlyStoppingDecision::Stop => {
                info!(
                    epoch,
                    patience = stopper.patience,
                    best_epoch = ?stopper.best_epoch(),
                    "early stopping"
                );
                stopped_early = true;
                break;
            }
        }
    }
    if let Some(best) = best_model {
        info!(
            best_epoch = ?stopper.best_epoch(),
            best_val_loss = ?stopper.best(),
            "restoring best weights"
        );
        model = best;
    }
    Ok(MonitoredRun {
        model,
        stopped_early,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stands in for a model: remembers which epoch produced it.
    fn scripted(
        losses: &[f32],
        patience: usize,
    ) -> (MonitoredRun<Option<usize>>, Vec<usize>, EarlyStopping) {
        let mut stopper = EarlyStopping::new(patience);
        let mut trained = Vec::new();
        let run = run_monitored(None, 0..losses.len(), &mut stopper, |_, epoch| {
            trained.push(epoch);
            Ok::<_, ()>((Some(epoch), losses[epoch]))
        })
        .unwrap();
        (run, trained, stopper)
    }

    #[test]
    fn worse_epochs_after_the_best_are_rolled_back() {
        let (run, trained, stopper) = scripted(&[3.0, 5.0, 6.0, 1.0], 2);
        assert!(run.stopped_early);
        assert_eq!(trained, vec![0, 1, 2]);
        assert_eq!(run.model, Some(0));
        assert_eq!(stopper.best(), Some(3.0));
    }

    #[test]
    fn best_weights_are_restored_without_an_early_stop() {
        let (run, trained, _) = scripted(&[5.0, 3.0, 4.0], 5);
        assert!(!run.stopped_early);
        assert_eq!(trained, vec![0, 1, 2]);
        assert_eq!(run.model, Some(1));
    }

    #[test]
    fn without_any_improvement_the_last_model_is_kept() {
        let (run, _, stopper) = scripted(&[f32::NAN, f32::NAN], 5);
        assert_eq!(run.model, Some(1));
        assert_eq!(stopper.best(), None);
    }

    #[test]
    fn step_errors_propagate() {
        let mut stopper = EarlyStopping::new(2);
        let result = run_monitored(0u8, 0..3, &mut stopper, |m, epoch| {
            if epoch == 1 {
                Err("boom")
            } else {
                Ok((m, 1.0))
            }
        });
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[test]
    fn first_finite_observation_is_an_improvement() {
        let mut es = EarlyStopping::new(3);
        assert_eq!(es.observe(0, 12.0), EarlyStoppingDecision::Improved);
        assert_eq!(es.best(), Some(12.0));
        assert_eq!(es.best_epoch(), Some(0));
    }

    #[test]
    fn stops_only_after_patience_non_improving_epochs() {
        let mut es = EarlyStopping::new(5);
        es.observe(10, 8.0);
        for epoch in 11..15 {
            assert_eq!(es.observe(epoch, 8.5), EarlyStoppingDecision::Continue);
        }
        assert_eq!(es.wait(), 4);
        assert_eq!(es.observe(15, 9.0), EarlyStoppingDecision::Stop);
        assert_eq!(es.best_epoch(), Some(10));
    }

    #[test]
    fn improvement_resets_the_counter() {
        let mut es = EarlyStopping::new(2);
        es.observe(0, 5.0);
        assert_eq!(es.observe(1, 6.0), EarlyStoppingDecision::Continue);
        assert_eq!(es.observe(2, 4.0), EarlyStoppingDecision::Improved);
        assert_eq!(es.wait(), 0);
        assert_eq!(es.observe(3, 4.0), EarlyStoppingDecision::Continue);
        assert_eq!(es.observe(4, 4.5), EarlyStoppingDecision::Stop);
    }

    #[test]
    fn nan_losses_count_against_patience() {
        let mut es = EarlyStopping::new(1);
        es.observe(0, 3.0);
        assert_eq!(es.observe(1, f32::NAN), EarlyStoppingDecision::Stop);
        assert_eq!(es.best(), Some(3.0));
    }

    #[test]
    fn min_delta_requires_a_real_improvement() {
        let mut es = EarlyStopping::new(3).with_min_delta(0.5);
        es.observe(0, 10.0);
        assert_eq!(es.observe(1, 9.8), EarlyStoppingDecision::Continue);
        assert_eq!(es.observe(2, 9.0), EarlyStoppingDecision::Improved);
    }
}
