//! Mode-dependent transforms applied to the `image` and `label` columns.
//!
//! ```text
//! Train: flip(0.5) -> to tensor -> normalize -> HWC→CHW
//! Eval:  resize(256) -> center crop(112) -> to tensor -> normalize -> HWC→CHW
//! label: cast to int32
//! ```

use crate::sample::{Sample, IMAGE_COLUMN, LABEL_COLUMN};
use crate::transforms::label::LabelToTensor;
use crate::transforms::vision::{
    CenterCrop, HwcToChw, Normalize, RandomHorizontalFlip, Resize, ToHwcTensor,
};
use crate::transforms::{Chain, Transform};
use anyhow::Result;
use image::DynamicImage;
use tch::Tensor;

/// Side length of the square images fed to the model.
pub const IMAGE_SIZE: u32 = 112;
/// Shorter-side length images are resized to before the evaluation crop.
pub const EVAL_RESIZE: u32 = 256;
pub const FLIP_PROBABILITY: f64 = 0.5;
pub const CHANNEL_MEAN: [f32; 3] = [0.5 * 255.0; 3];
pub const CHANNEL_STD: [f32; 3] = [0.5 * 255.0; 3];

/// Whether the pipeline feeds training (augmented) or evaluation (deterministic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

impl Mode {
    pub fn from_do_train(do_train: bool) -> Self {
        if do_train {
            Mode::Train
        } else {
            Mode::Eval
        }
    }
}

/// Parameters of the image transform chains.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub image_size: u32,
    pub eval_resize: u32,
    pub flip_probability: f64,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE,
            eval_resize: EVAL_RESIZE,
            flip_probability: FLIP_PROBABILITY,
            mean: CHANNEL_MEAN.to_vec(),
            std: CHANNEL_STD.to_vec(),
        }
    }
}

type TrainChain = Chain<
    Chain<Chain<RandomHorizontalFlip, ToHwcTensor, DynamicImage>, Normalize, Tensor>,
    HwcToChw,
    Tensor,
>;

type EvalChain = Chain<
    Chain<
        Chain<Chain<Resize, CenterCrop, DynamicImage>, ToHwcTensor, DynamicImage>,
        Normalize,
        Tensor,
    >,
    HwcToChw,
    Tensor,
>;

/// The image transform chain, fixed once when the pipeline is built.
#[derive(Debug)]
pub enum ImageTransforms {
    Train(TrainChain),
    Eval(EvalChain),
}

impl ImageTransforms {
    pub fn for_mode(mode: Mode, config: &ImageConfig) -> Result<Self> {
        Ok(match mode {
            Mode::Train => Self::train(config)?,
            Mode::Eval => Self::eval(config)?,
        })
    }

    pub fn train(config: &ImageConfig) -> Result<Self> {
        let chain = RandomHorizontalFlip::new(config.flip_probability)?
            .then(ToHwcTensor)
            .then(Normalize::new(&config.mean, &config.std)?)
            .then(HwcToChw);
        Ok(ImageTransforms::Train(chain))
    }

    pub fn eval(config: &ImageConfig) -> Result<Self> {
        let chain = Resize::new(config.eval_resize)?
            .then(CenterCrop::new(config.image_size)?)
            .then(ToHwcTensor)
            .then(Normalize::new(&config.mean, &config.std)?)
            .then(HwcToChw);
        Ok(ImageTransforms::Eval(chain))
    }

    pub fn mode(&self) -> Mode {
        match self {
            ImageTransforms::Train(_) => Mode::Train,
            ImageTransforms::Eval(_) => Mode::Eval,
        }
    }
}

impl Transform<DynamicImage, Tensor> for ImageTransforms {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        match self {
            ImageTransforms::Train(chain) => chain.apply(img),
            ImageTransforms::Eval(chain) => chain.apply(img),
        }
    }
}

/// Turns a decoded `(image, label)` pair into a two-column [`Sample`].
#[derive(Debug)]
pub struct ColumnTransforms {
    pub image: ImageTransforms,
    pub label: LabelToTensor,
}

impl ColumnTransforms {
    pub fn new(mode: Mode, config: &ImageConfig) -> Result<Self> {
        Ok(Self {
            image: ImageTransforms::for_mode(mode, config)?,
            label: LabelToTensor,
        })
    }
}

impl Transform<(DynamicImage, i32), Sample> for ColumnTransforms {
    fn apply(&self, (image, label): (DynamicImage, i32)) -> Result<Sample> {
        Ok(Sample::from_single(IMAGE_COLUMN, self.image.apply(image)?)
            .with_feature(LABEL_COLUMN, self.label.apply(label)?))
    }
}
