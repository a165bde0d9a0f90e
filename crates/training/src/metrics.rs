use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use burn_dataset::BatchIter;
use models::AgeRegressor;

/// Mean absolute error between `[B, 1]` predictions and targets.
pub fn mae_loss<B: Backend>(preds: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (preds - targets).abs().mean()
}

/// First element of a tensor as `f32`, `NaN` if it cannot be read.
pub fn scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f32 {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .ok()
        .and_then(|v| v.first().copied())
        .unwrap_or(f32::NAN)
}

/// Sample-weighted running mean of per-batch losses.
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanMeter {
    sum: f64,
    count: usize,
}

impl MeanMeter {
    pub fn update(&mut self, batch_mean: f32, batch_len: usize) {
        self.sum += batch_mean as f64 * batch_len as f64;
        self.count += batch_len;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f32 {
        if self.count == 0 {
            f32::NAN
        } else {
            (self.sum / self.count as f64) as f32
        }
    }
}

/// Full pass over `iter` in inference mode; returns the MAE over every sample.
pub fn evaluate_mae<B: Backend>(
    model: &AgeRegressor<B>,
    iter: &mut BatchIter,
    batch_size: usize,
    device: &B::Device,
) -> anyhow::Result<f32> {
    iter.restart();
    let mut meter = MeanMeter::default();
    while let Some(batch) = iter.next_batch::<B>(batch_size, device)? {
        let batch_len = batch.ages.dims()[0];
        let preds = model.forward(batch.images);
        meter.update(scalar(mae_loss(preds, batch.ages)), batch_len);
    }
    Ok(meter.mean())
}
