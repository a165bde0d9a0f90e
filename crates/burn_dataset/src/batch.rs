//! Batch iteration for training and validation.

use crate::aug::{DatasetConfig, TransformPipeline};
use crate::index::{index_buckets, load_sample};
use crate::splits::split_indices;
use crate::types::{AgeSample, BurnDatasetError, DatasetResult, SampleIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

/// Index `root`, split it with `split_seed`, and build one iterator per side.
/// Validation reuses the training preprocessing without augmentation or shuffling.
pub fn build_train_val_iters(
    root: &Path,
    val_fraction: f32,
    split_seed: u64,
    train_cfg: DatasetConfig,
) -> DatasetResult<(BatchIter, BatchIter)> {
    let indices = index_buckets(root)?;
    if indices.is_empty() {
        return Err(BurnDatasetError::Other(format!(
            "no images found under {}",
            root.display()
        )));
    }
    let (train_idx, val_idx) = split_indices(indices, val_fraction, split_seed)?;
    let val_cfg = train_cfg.for_validation();
    let train_iter = BatchIter::from_indices(train_idx, train_cfg)?;
    let val_iter = BatchIter::from_indices(val_idx, val_cfg)?;
    Ok((train_iter, val_iter))
}

pub struct BurnBatch<B: burn::tensor::backend::Backend> {
    /// `[batch, 3, size, size]`, normalized.
    pub images: burn::tensor::Tensor<B, 4>,
    /// `[batch, 1]` target ages.
    pub ages: burn::tensor::Tensor<B, 2>,
}

pub struct BatchIter {
    indices: Vec<SampleIndex>,
    order: Vec<usize>,
    cursor: usize,
    cfg: DatasetConfig,
    pipeline: TransformPipeline,
    rng: rand::rngs::StdRng,
    processed_samples: usize,
    processed_batches: usize,
    started: Instant,
    total_load_time: Duration,
    last_log: Instant,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
    images_buf: Vec<f32>,
    ages_buf: Vec<f32>,
}

impl BatchIter {
    pub fn from_root(root: &Path, cfg: DatasetConfig) -> DatasetResult<Self> {
        let indices = index_buckets(root)?;
        Self::from_indices(indices, cfg)
    }

    pub fn from_indices(indices: Vec<SampleIndex>, cfg: DatasetConfig) -> DatasetResult<Self> {
        cfg.preprocess.validate()?;
        let rng = match cfg.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
        };
        let log_every_samples = match std::env::var("BURN_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let now = Instant::now();
        let pipeline = TransformPipeline::from_config(&cfg);
        let order = (0..indices.len()).collect();
        let mut iter = Self {
            indices,
            order,
            cursor: 0,
            cfg,
            processed_samples: 0,
            processed_batches: 0,
            started: now,
            total_load_time: Duration::ZERO,
            last_log: now,
            last_logged_samples: 0,
            log_every_samples,
            images_buf: Vec::new(),
            ages_buf: Vec::new(),
            pipeline,
            rng,
        };
        iter.restart();
        Ok(iter)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    /// Rewind for a new pass, reshuffling when configured.
    pub fn restart(&mut self) {
        self.cursor = 0;
        if self.cfg.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    pub fn next_batch<B: burn::tensor::backend::Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<BurnBatch<B>>> {
        let batch_size = batch_size.max(1);
        if self.cursor >= self.order.len() {
            return Ok(None);
        }
        let start = self.cursor;
        let end = (start + batch_size).min(self.order.len());
        if self.cfg.drop_last && end - start < batch_size {
            self.cursor = self.order.len();
            return Ok(None);
        }
        self.cursor = end;
        // Per-sample RNGs derive from one draw so parallel loading stays reproducible.
        let batch_seed: u64 = self.rng.random();

        let t_load = Instant::now();
        let loaded: Vec<DatasetResult<AgeSample>> = self.order[start..end]
            .par_iter()
            .enumerate()
            .map(|(i, &idx)| {
                let mut rng = rand::rngs::StdRng::seed_from_u64(batch_seed.wrapping_add(i as u64));
                load_sample(&self.indices[idx], &self.pipeline, &mut rng)
            })
            .collect();
        let load_elapsed = t_load.elapsed();

        self.images_buf.clear();
        self.ages_buf.clear();
        let sample_len = self.cfg.preprocess.input_len();
        if self.images_buf.capacity() < batch_size * sample_len {
            self.images_buf
                .reserve(batch_size * sample_len - self.images_buf.capacity());
        }
        for res in loaded {
            let sample = res?;
            self.images_buf.extend_from_slice(&sample.image_chw);
            self.ages_buf.push(sample.age);
        }

        let batch_len = self.ages_buf.len();
        let size = self.cfg.preprocess.image_size as usize;
        let images = burn::tensor::Tensor::<B, 1>::from_floats(self.images_buf.as_slice(), device)
            .reshape([batch_len, 3, size, size]);
        let ages = burn::tensor::Tensor::<B, 1>::from_floats(self.ages_buf.as_slice(), device)
            .reshape([batch_len, 1]);

        self.processed_samples += batch_len;
        self.processed_batches += 1;
        self.total_load_time += load_elapsed;
        self.maybe_log_progress();

        Ok(Some(BurnBatch { images, ages }))
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        let processed_since = self
            .processed_samples
            .saturating_sub(self.last_logged_samples);
        let since_last = self.last_log.elapsed();
        if processed_since < threshold && since_last < Duration::from_secs(30) {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let avg_load_ms = if self.processed_batches > 0 {
            (self.total_load_time.as_secs_f64() * 1000.0) / self.processed_batches as f64
        } else {
            0.0
        };
        info!(
            batches = self.processed_batches,
            samples = self.processed_samples,
            elapsed_s = secs,
            rate = self.processed_samples as f32 / secs,
            avg_load_ms,
            "dataset progress"
        );
        self.last_logged_samples = self.processed_samples;
        self.last_log = Instant::now();
    }
}
