//! MobileNetV2 feature extractor (width multiplier 1.0, no classifier).
//!
//! Shapes:
//! - Input images: `[B, 3, H, W]`, normalized to `[-1, 1]`
//! - Output features: `[B, 1280, H/32, W/32]`

use crate::pretrained::{unit_keys, PretrainedError, Unit, UnitKeys, WeightLayout, WeightMap};
use burn::module::{Ignored, Module, Param, RunningState};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use std::path::Path;
use tracing::info;

/// Inverted-residual settings as (expansion t, output channels c, repeats n, first stride s).
pub const INVERTED_RESIDUAL_SETTINGS: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

pub const STEM_CHANNELS: usize = 32;
pub const FEATURE_CHANNELS: usize = 1280;

/// Total inverted-residual blocks (sum of repeats).
pub const NUM_BLOCKS: usize = 17;

#[derive(Debug, Clone, Copy)]
pub struct MobileNetV2Config {
    pub in_channels: usize,
}

impl Default for MobileNetV2Config {
    fn default() -> Self {
        Self { in_channels: 3 }
    }
}

impl MobileNetV2Config {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MobileNetV2<B> {
        let stem = ConvNormAct::new(self.in_channels, STEM_CHANNELS, 3, 2, 1, true, device);
        let mut blocks = Vec::with_capacity(NUM_BLOCKS);
        let mut in_c = STEM_CHANNELS;
        for (t, c, n, s) in INVERTED_RESIDUAL_SETTINGS {
            for i in 0..n {
                let stride = if i == 0 { s } else { 1 };
                blocks.push(InvertedResidual::new(in_c, c, stride, t, device));
                in_c = c;
            }
        }
        let head_conv = ConvNormAct::new(in_c, FEATURE_CHANNELS, 1, 1, 1, true, device);
        MobileNetV2 {
            stem,
            blocks,
            head_conv,
            config: Ignored(*self),
        }
    }
}

/// Conv (no bias) + batch norm, optionally followed by ReLU6.
#[derive(Module, Debug)]
pub struct ConvNormAct<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B>,
    relu6: bool,
}

impl<B: Backend> ConvNormAct<B> {
    fn new(
        in_c: usize,
        out_c: usize,
        kernel: usize,
        stride: usize,
        groups: usize,
        relu6: bool,
        device: &B::Device,
    ) -> Self {
        let pad = kernel / 2;
        let conv = Conv2dConfig::new([in_c, out_c], [kernel, kernel])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .with_groups(groups)
            .with_bias(false)
            .init(device);
        let norm = BatchNormConfig::new(out_c).init(device);
        Self { conv, norm, relu6 }
    }

    fn weight_dims(&self) -> [usize; 4] {
        self.conv.weight.val().dims()
    }

    fn expected_tensors(&self, keys: &UnitKeys, out: &mut Vec<(String, Vec<usize>)>) {
        let dims = self.weight_dims();
        out.push((keys.conv_weight.clone(), dims.to_vec()));
        for name in keys.norm_tensors() {
            out.push((name, vec![dims[0]]));
        }
    }

    /// Overwrite conv weight, batch-norm affine and running statistics from `weights`.
    fn import(
        mut self,
        weights: &mut WeightMap,
        keys: &UnitKeys,
        device: &B::Device,
    ) -> Result<Self, PretrainedError> {
        let dims = self.weight_dims();
        let values = weights.take(&keys.conv_weight, &dims)?;
        self.conv.weight = Param::from_tensor(Tensor::from_data(TensorData::new(values, dims), device));

        let channels = [dims[0]];
        let [gamma, beta, mean, var] = keys.norm_keys();
        let vector = |values: Vec<f32>| Tensor::<B, 1>::from_data(TensorData::new(values, channels), device);
        self.norm.gamma = Param::from_tensor(vector(weights.take(&gamma, &channels)?));
        self.norm.beta = Param::from_tensor(vector(weights.take(&beta, &channels)?));
        self.norm.running_mean = RunningState::new(vector(weights.take(&mean, &channels)?));
        self.norm.running_var = RunningState::new(vector(weights.take(&var, &channels)?));
        Ok(self)
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.norm.forward(self.conv.forward(x));
        if self.relu6 {
            x.clamp(0.0, 6.0)
        } else {
            x
        }
    }
}

/// Expand (1x1) -> depthwise (3x3) -> linear projection (1x1), with a skip when shapes match.
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    expand: Option<ConvNormAct<B>>,
    depthwise: ConvNormAct<B>,
    project: ConvNormAct<B>,
    use_residual: bool,
}

impl<B: Backend> InvertedResidual<B> {
    fn new(in_c: usize, out_c: usize, stride: usize, expand_ratio: usize, device: &B::Device) -> Self {
        let hidden = in_c * expand_ratio;
        let expand = (expand_ratio != 1)
            .then(|| ConvNormAct::new(in_c, hidden, 1, 1, 1, true, device));
        let depthwise = ConvNormAct::new(hidden, hidden, 3, stride, hidden, true, device);
        let project = ConvNormAct::new(hidden, out_c, 1, 1, 1, false, device);
        Self {
            expand,
            depthwise,
            project,
            use_residual: stride == 1 && in_c == out_c,
        }
    }

    fn units(&self, block: usize) -> Vec<(Unit, &ConvNormAct<B>)> {
        let expanded = self.expand.is_some();
        let mut units = Vec::with_capacity(3);
        if let Some(expand) = &self.expand {
            units.push((Unit::Expand { block }, expand));
        }
        units.push((Unit::Depthwise { block, expanded }, &self.depthwise));
        units.push((Unit::Project { block, expanded }, &self.project));
        units
    }

    fn import(
        self,
        weights: &mut WeightMap,
        layout: WeightLayout,
        block: usize,
        device: &B::Device,
    ) -> Result<Self, PretrainedError> {
        let expanded = self.expand.is_some();
        let expand = match self.expand {
            Some(expand) => {
                let keys = unit_keys(layout, Unit::Expand { block });
                Some(expand.import(weights, &keys, device)?)
            }
            None => None,
        };
        let depthwise = self.depthwise.import(
            weights,
            &unit_keys(layout, Unit::Depthwise { block, expanded }),
            device,
        )?;
        let project = self.project.import(
            weights,
            &unit_keys(layout, Unit::Project { block, expanded }),
            device,
        )?;
        Ok(Self {
            expand,
            depthwise,
            project,
            use_residual: self.use_residual,
        })
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.expand {
            Some(expand) => expand.forward(input.clone()),
            None => input.clone(),
        };
        let x = self.project.forward(self.depthwise.forward(x));
        if self.use_residual {
            x + input
        } else {
            x
        }
    }
}

#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    stem: ConvNormAct<B>,
    blocks: Vec<InvertedResidual<B>>,
    head_conv: ConvNormAct<B>,
    pub config: Ignored<MobileNetV2Config>,
}

impl<B: Backend> MobileNetV2<B> {
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.forward_prefix(images, self.blocks.len());
        self.forward_suffix(x, self.blocks.len())
    }

    /// Stem plus blocks `[0, cutoff)`. `cutoff` is clamped to the block count.
    pub fn forward_prefix(&self, images: Tensor<B, 4>, cutoff: usize) -> Tensor<B, 4> {
        let cutoff = cutoff.min(self.blocks.len());
        let mut x = self.stem.forward(images);
        for block in &self.blocks[..cutoff] {
            x = block.forward(x);
        }
        x
    }

    /// Blocks `[cutoff, NUM_BLOCKS)` plus the final 1x1 conv.
    pub fn forward_suffix(&self, x: Tensor<B, 4>, cutoff: usize) -> Tensor<B, 4> {
        let cutoff = cutoff.min(self.blocks.len());
        let mut x = x;
        for block in &self.blocks[cutoff..] {
            x = block.forward(x);
        }
        self.head_conv.forward(x)
    }

    /// Load backbone weights from `path`.
    ///
    /// `*.safetensors` files are imported as ImageNet checkpoints (torchvision or timm
    /// tensor names, see [`WeightLayout`]); anything else is read as a Burn record
    /// written by [`MobileNetV2::save_backbone`].
    pub fn load_pretrained<P: AsRef<Path>>(
        self,
        path: P,
        device: &B::Device,
    ) -> Result<Self, PretrainedError> {
        let path = path.as_ref();
        let is_safetensors = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("safetensors"));
        if is_safetensors {
            let weights = WeightMap::from_file(path)?;
            return self.import_weights(weights, device);
        }
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.load_file(path, &recorder, device)
            .map_err(|e| PretrainedError::Record(e.to_string()))
    }

    /// Copy every backbone tensor out of `weights`. Missing tensors or shape
    /// mismatches fail; tensors the backbone has no slot for (classifier, counters)
    /// are ignored.
    pub fn import_weights(
        self,
        mut weights: WeightMap,
        device: &B::Device,
    ) -> Result<Self, PretrainedError> {
        let layout = weights.layout().ok_or(PretrainedError::UnknownLayout)?;
        let stem = self
            .stem
            .import(&mut weights, &unit_keys(layout, Unit::Stem), device)?;
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for (index, block) in self.blocks.into_iter().enumerate() {
            blocks.push(block.import(&mut weights, layout, index, device)?);
        }
        let head_conv = self
            .head_conv
            .import(&mut weights, &unit_keys(layout, Unit::Head), device)?;

        let ignored = weights.remaining();
        info!(
            layout = ?layout,
            ignored = ignored.len(),
            "imported pretrained MobileNetV2 weights"
        );
        Ok(Self {
            stem,
            blocks,
            head_conv,
            config: self.config,
        })
    }

    /// Tensor names and shapes an import in `layout` reads, in network order.
    pub fn expected_tensors(&self, layout: WeightLayout) -> Vec<(String, Vec<usize>)> {
        let mut out = Vec::new();
        self.stem
            .expected_tensors(&unit_keys(layout, Unit::Stem), &mut out);
        for (index, block) in self.blocks.iter().enumerate() {
            for (unit, conv) in block.units(index) {
                conv.expected_tensors(&unit_keys(layout, unit), &mut out);
            }
        }
        self.head_conv
            .expected_tensors(&unit_keys(layout, Unit::Head), &mut out);
        out
    }

    pub fn save_backbone<P: AsRef<Path>>(self, path: P) -> Result<(), RecorderError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.save_file(path.as_ref(), &recorder)
    }
}
