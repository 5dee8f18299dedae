use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{AsRefStr, EnumCount as EnumCountMacro, EnumIter, EnumString, FromRepr};

/// Minimum top-class probability required to report a concrete label.
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

pub const UNKNOWN_LABEL: &str = "Unknown Class";
pub const ERROR_LABEL: &str = "Error";

/// Output classes of the corn disease model, in model output order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    AsRefStr,
    EnumIter,
    EnumString,
    EnumCountMacro,
    FromRepr,
)]
#[repr(usize)]
pub enum DiseaseLabel {
    Aphids = 0,
    Armyworm = 1,
    #[serde(rename = "Common Cutworm")]
    #[strum(serialize = "Common Cutworm")]
    CommonCutworm = 2,
    #[serde(rename = "Common Rust")]
    #[strum(serialize = "Common Rust")]
    CommonRust = 3,
    #[serde(rename = "Common Smut")]
    #[strum(serialize = "Common Smut")]
    CommonSmut = 4,
    #[serde(rename = "Corn Borer")]
    #[strum(serialize = "Corn Borer")]
    CornBorer = 5,
    Earwig = 6,
    #[serde(rename = "Fusarium Ear Rot")]
    #[strum(serialize = "Fusarium Ear Rot")]
    FusariumEarRot = 7,
    #[serde(rename = "Gray Leaf Spot")]
    #[strum(serialize = "Gray Leaf Spot")]
    GrayLeafSpot = 8,
    #[serde(rename = "Healthy Corn")]
    #[strum(serialize = "Healthy Corn")]
    HealthyCorn = 9,
    #[serde(rename = "Healthy Leaf")]
    #[strum(serialize = "Healthy Leaf")]
    HealthyLeaf = 10,
    #[serde(rename = "Leaf Blight")]
    #[strum(serialize = "Leaf Blight")]
    LeafBlight = 11,
    Leafhopper = 12,
}

impl DiseaseLabel {
    pub fn from_index(index: usize) -> Option<Self> {
        Self::from_repr(index)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of the result view rendered for this label.
    pub fn view_slug(self) -> &'static str {
        match self {
            DiseaseLabel::Aphids => "aphids",
            DiseaseLabel::Armyworm => "armyworm",
            DiseaseLabel::CommonCutworm => "common_cutworm",
            DiseaseLabel::CommonRust => "common_rust",
            DiseaseLabel::CommonSmut => "common_smut",
            DiseaseLabel::CornBorer => "corn_borer",
            DiseaseLabel::Earwig => "earwig",
            DiseaseLabel::FusariumEarRot => "fusarium_ear_rot",
            DiseaseLabel::GrayLeafSpot => "gray_leaf_spot",
            DiseaseLabel::HealthyCorn => "healthycorn",
            DiseaseLabel::HealthyLeaf => "healthyleaf",
            DiseaseLabel::LeafBlight => "leaf_blight",
            DiseaseLabel::Leafhopper => "leafhopper",
        }
    }

    pub fn is_healthy(self) -> bool {
        matches!(self, DiseaseLabel::HealthyCorn | DiseaseLabel::HealthyLeaf)
    }

    /// Checks that the index table is dense and that names and views are unique.
    /// Run once at startup before any request is served.
    pub fn validate_mapping() -> Result<(), String> {
        let mut names = HashSet::new();
        let mut slugs = HashSet::new();
        for index in 0..Self::COUNT {
            let label = Self::from_index(index)
                .ok_or_else(|| format!("no label for class index {}", index))?;
            if label.index() != index {
                return Err(format!("label {} reports index {}", label, label.index()));
            }
            if !names.insert(label.to_string()) {
                return Err(format!("duplicate label name {}", label));
            }
            if !slugs.insert(label.view_slug()) {
                return Err(format!("duplicate view {}", label.view_slug()));
            }
        }
        if Self::iter().count() != Self::COUNT {
            return Err("label iteration does not match label count".to_string());
        }
        Ok(())
    }
}

/// Outcome of one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Prediction {
    #[display(fmt = "{}", _0)]
    Disease(DiseaseLabel),
    #[display(fmt = "Unknown Class")]
    Unknown,
    #[display(fmt = "Error")]
    Error,
}

impl Prediction {
    pub fn disease(&self) -> Option<DiseaseLabel> {
        match self {
            Prediction::Disease(label) => Some(*label),
            _ => None,
        }
    }
}

impl From<Prediction> for String {
    fn from(prediction: Prediction) -> Self {
        prediction.to_string()
    }
}

impl FromStr for Prediction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, String> {
        match value {
            UNKNOWN_LABEL => Ok(Prediction::Unknown),
            ERROR_LABEL => Ok(Prediction::Error),
            other => DiseaseLabel::from_str(other)
                .map(Prediction::Disease)
                .map_err(|_| format!("unrecognised label: {}", other)),
        }
    }
}

impl TryFrom<String> for Prediction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub prediction: Prediction,
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn error() -> Self {
        Self {
            prediction: Prediction::Error,
            confidence: 0.0,
        }
    }

    /// Picks the top class, falling back to `Unknown` below the threshold.
    pub fn from_probabilities(probabilities: &[f32]) -> Self {
        let top = probabilities
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            });

        let Some((index, confidence)) = top else {
            return Self::error();
        };
        let confidence = confidence.clamp(0.0, 1.0);

        let prediction = if confidence < CONFIDENCE_THRESHOLD {
            Prediction::Unknown
        } else {
            DiseaseLabel::from_index(index)
                .map(Prediction::Disease)
                .unwrap_or(Prediction::Unknown)
        };

        Self {
            prediction,
            confidence,
        }
    }
}
