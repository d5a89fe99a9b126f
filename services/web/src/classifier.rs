//! Waste image classifier
//!
//! Images are decoded, resized to 224x224 RGB, scaled to [0, 1] and fed to
//! the model as a single NHWC batch. The label is the arg-max of the twelve
//! scores the model returns.

use anyhow::Context;
use image::imageops::FilterType;
use std::{fmt, path::Path, sync::Arc};
use thiserror::Error;
use tracing::info;
use tract_onnx::prelude::*;

/// Side length of the square model input
pub const INPUT_SIZE: usize = 224;

/// Waste categories, in the order of the model's output vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Battery,
    Biological,
    BrownGlass,
    Cardboard,
    Clothes,
    GreenGlass,
    Metal,
    Paper,
    Plastic,
    Shoes,
    Trash,
    WhiteGlass,
}

impl Label {
    pub const ALL: [Label; 12] = [
        Label::Battery,
        Label::Biological,
        Label::BrownGlass,
        Label::Cardboard,
        Label::Clothes,
        Label::GreenGlass,
        Label::Metal,
        Label::Paper,
        Label::Plastic,
        Label::Shoes,
        Label::Trash,
        Label::WhiteGlass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Battery => "battery",
            Label::Biological => "biological",
            Label::BrownGlass => "brown-glass",
            Label::Cardboard => "cardboard",
            Label::Clothes => "clothes",
            Label::GreenGlass => "green-glass",
            Label::Metal => "metal",
            Label::Paper => "paper",
            Label::Plastic => "plastic",
            Label::Shoes => "shoes",
            Label::Trash => "trash",
            Label::WhiteGlass => "white-glass",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification failures
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Model returned {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },

    #[error("Failed to read upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Classification task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Model input: one NHWC image, `[1, 224, 224, 3]`
pub type InputBatch = tract_ndarray::Array4<f32>;

/// One forward pass: a batch in, one score per label out
pub trait Scorer: Send + Sync {
    fn score(&self, input: InputBatch) -> Result<Vec<f32>, ClassifierError>;
}

/// Classifier configuration
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model_path: String,
}

impl ClassifierConfig {
    /// Create a new ClassifierConfig from environment variables
    ///
    /// # Environment Variables
    /// - `MODEL_PATH`: ONNX model file (default: "model/garbage_classifier.onnx")
    pub fn from_env() -> anyhow::Result<Self> {
        let model_path = std::env::var("MODEL_PATH")
            .unwrap_or_else(|_| "model/garbage_classifier.onnx".to_string());
        Ok(Self { model_path })
    }
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX model optimized once and run with tract
pub struct OnnxScorer {
    plan: OnnxPlan,
}

impl OnnxScorer {
    /// Load and optimize the model at `model_path`
    pub fn load(model_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let model_path = model_path.as_ref();
        info!("Loading classifier model from {}", model_path.display());

        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("Failed to read model {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, INPUT_SIZE, INPUT_SIZE, 3)),
            )?
            .into_optimized()?
            .into_runnable()?;

        info!("Classifier model ready");
        Ok(Self { plan })
    }
}

impl Scorer for OnnxScorer {
    fn score(&self, input: InputBatch) -> Result<Vec<f32>, ClassifierError> {
        let outputs = self
            .plan
            .run(tvec!(input.into_tensor().into()))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| ClassifierError::Inference("Model produced no output".to_string()))?;

        let scores = output
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?
            .iter()
            .copied()
            .collect();

        Ok(scores)
    }
}

/// Decode an image and lay it out as the model input batch
pub fn preprocess(image_data: &[u8]) -> Result<InputBatch, ClassifierError> {
    let image = image::load_from_memory(image_data)?;
    let side = INPUT_SIZE as u32;
    let resized = image
        .resize_exact(side, side, FilterType::CatmullRom)
        .to_rgb8();

    let tensor = tract_ndarray::Array4::from_shape_fn(
        (1, INPUT_SIZE, INPUT_SIZE, 3),
        |(_, y, x, channel)| f32::from(resized.get_pixel(x as u32, y as u32)[channel]) / 255.0,
    );

    Ok(tensor)
}

/// Arg-max over the score vector; ties go to the earliest label
pub fn select_label(scores: &[f32]) -> Result<Label, ClassifierError> {
    if scores.len() != Label::ALL.len() {
        return Err(ClassifierError::OutputShape {
            expected: Label::ALL.len(),
            actual: scores.len(),
        });
    }

    let mut best = 0;
    for (index, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = index;
        }
    }

    Ok(Label::ALL[best])
}

/// Image classifier over a shared, read-only scorer
#[derive(Clone)]
pub struct ImageClassifier {
    scorer: Arc<dyn Scorer>,
}

impl ImageClassifier {
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Self { scorer }
    }

    /// Classify encoded image bytes. CPU bound; call off the async runtime.
    pub fn predict(&self, image_data: &[u8]) -> Result<Label, ClassifierError> {
        let input = preprocess(image_data)?;
        let scores = self.scorer.score(input)?;
        select_label(&scores)
    }

    /// Classify an image file on the blocking thread pool
    pub async fn classify_file(&self, path: &Path) -> Result<Label, ClassifierError> {
        let image_data = tokio::fs::read(path).await?;
        let classifier = self.clone();
        let label = tokio::task::spawn_blocking(move || classifier.predict(&image_data)).await??;
        Ok(label)
    }
}
