use crate::error::{BridgeError, Result};
use log::{debug, info, trace};
use ndarray::Array2;
use ort::session::Session;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// 1 = clap, 0 = anything else
    pub label: u8,
    pub confidence: f32,
}

pub trait Classifier {
    fn predict(&mut self, features: &[f32]) -> Result<Prediction>;
}

/// Chooses the model implementation from the file extension.
pub fn load_classifier(path: &Path, feature_count: usize) -> Result<Box<dyn Classifier>> {
    let extension = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
    let model: Box<dyn Classifier> = match extension.as_deref() {
        Some("onnx") => Box::new(OnnxClassifier::new(path)?),
        Some("json") => Box::new(LogisticClassifier::load(path, feature_count)?),
        _ => {
            return Err(BridgeError::InvalidConfig(format!(
                "unknown model format {:?}, expected a .onnx or .json file",
                path
            )))
        }
    };
    info!("Model {:?} loaded", path);
    Ok(model)
}

/// ONNX model run through onnxruntime. Fed a `(1, F)` f32 tensor.
pub struct OnnxClassifier {
    session: Session,
}

impl OnnxClassifier {
    pub fn new(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            return Err(BridgeError::open("model", model_path, "file not found"));
        }
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.with_inter_threads(1))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| BridgeError::open("model", model_path, e.to_string()))?;
        Ok(OnnxClassifier { session })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&mut self, features: &[f32]) -> Result<Prediction> {
        let input = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| BridgeError::Model(e.to_string()))?;
        let outputs = self.session.run(ort::inputs![input]?)?;
        let scores = outputs[0].try_extract_tensor::<f32>()?;
        let row: Vec<f32> = scores.iter().copied().collect();
        trace!("model output {:?}", row);
        prediction_from_scores(&row)
    }
}

/// A single score is a clap probability; several are per-class scores.
fn prediction_from_scores(row: &[f32]) -> Result<Prediction> {
    match row {
        [] => Err(BridgeError::Model("model produced an empty output".to_string())),
        [probability] => Ok(Prediction {
            label: u8::from(*probability > 0.5),
            confidence: *probability,
        }),
        _ => {
            let (class, score) = row
                .iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, s)| if *s > best.1 { (i, *s) } else { best });
            Ok(Prediction {
                label: u8::from(class == 1),
                confidence: score,
            })
        }
    }
}

/// Logistic regression exported as JSON: `{"weights": [...], "intercept": b}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub weights: Vec<f32>,
    pub intercept: f32,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_threshold() -> f32 {
    0.5
}

impl LogisticClassifier {
    pub fn load(path: &Path, feature_count: usize) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| BridgeError::open("model", path, e))?;
        let model: LogisticClassifier =
            serde_json::from_str(&text).map_err(|e| BridgeError::open("model", path, e))?;
        if model.weights.len() != feature_count {
            return Err(BridgeError::InvalidConfig(format!(
                "model {:?} has {} weights but the feature count is {}",
                path,
                model.weights.len(),
                feature_count
            )));
        }
        debug!("Logistic model with {} weights, threshold {}", model.weights.len(), model.threshold);
        Ok(model)
    }

    pub fn probability(&self, features: &[f32]) -> f32 {
        let z: f32 = self.weights.iter().zip(features).map(|(w, x)| w * x).sum::<f32>() + self.intercept;
        1.0 / (1.0 + (-z).exp())
    }
}

impl Classifier for LogisticClassifier {
    fn predict(&mut self, features: &[f32]) -> Result<Prediction> {
        if features.len() != self.weights.len() {
            return Err(BridgeError::Model(format!(
                "expected {} features, got {}",
                self.weights.len(),
                features.len()
            )));
        }
        let p = self.probability(features);
        Ok(Prediction {
            label: u8::from(p >= self.threshold),
            confidence: p,
        })
    }
}
