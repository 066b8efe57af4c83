//! Healthy/infected classification flow on top of the classifier and
//! knowledge-base capabilities.
//!
//! Classifier labels follow loose string conventions (`Tomato_healthy`,
//! `early_blight`). They are parsed once into [`CropLabel`] and
//! [`DiseaseLabel`] here, so nothing downstream splits strings.

use std::fmt;

use image::DynamicImage;
use tracing::debug;

use crate::errors::{CropSegError, Result};
use crate::knowledge::{HealthyAdvice, InfectedAdvice};
use crate::traits::{Classifier, KnowledgeBase};

pub const INFECTION_MODEL: &str = "infection";
pub const HEALTHY_CROP_MODEL: &str = "healthy_crop";
pub const CROP_TYPE_MODEL: &str = "crop_type";
pub const HEALTHY_LABEL: &str = "Healthy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropLabel(String);

impl CropLabel {
    /// `"Tomato_healthy"` -> `Tomato`.
    pub fn from_healthy_label(label: &str) -> Result<Self> {
        let crop = label.split('_').next().unwrap_or_default().trim();
        if crop.is_empty() {
            return Err(CropSegError::Validation {
                field: "crop label".to_string(),
                reason: format!("{label:?} has no crop name"),
            });
        }
        Ok(Self(crop.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CropLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiseaseLabel(String);

impl DiseaseLabel {
    /// `"early_blight"` -> `Early Blight`.
    pub fn from_label(label: &str) -> Result<Self> {
        let name = label
            .split(['_', ' '])
            .filter(|word| !word.is_empty())
            .map(title_case)
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            return Err(CropSegError::Validation {
                field: "disease label".to_string(),
                reason: format!("{label:?} has no disease name"),
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiseaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    Healthy {
        crop: CropLabel,
        advice: HealthyAdvice,
    },
    Infected {
        crop_type: String,
        disease: DiseaseLabel,
        advice: InfectedAdvice,
    },
}

impl Diagnosis {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

pub struct Diagnoser<'a, C: Classifier + ?Sized, K: KnowledgeBase + ?Sized> {
    classifier: &'a C,
    knowledge: &'a K,
}

impl<'a, C: Classifier + ?Sized, K: KnowledgeBase + ?Sized> Diagnoser<'a, C, K> {
    pub const fn new(classifier: &'a C, knowledge: &'a K) -> Self {
        Self {
            classifier,
            knowledge,
        }
    }

    pub fn diagnose(&self, image: &DynamicImage) -> Result<Diagnosis> {
        let infection = self.classifier.classify(INFECTION_MODEL, image)?;
        debug!(label = %infection, "infection classification");

        if infection.trim() == HEALTHY_LABEL {
            self.diagnose_healthy(image)
        } else {
            self.diagnose_infected(image)
        }
    }

    fn diagnose_healthy(&self, image: &DynamicImage) -> Result<Diagnosis> {
        let label = self.classifier.classify(HEALTHY_CROP_MODEL, image)?;
        let crop = CropLabel::from_healthy_label(&label)?;
        let advice = self.knowledge.lookup_healthy(crop.as_str())?;
        Ok(Diagnosis::Healthy { crop, advice })
    }

    fn diagnose_infected(&self, image: &DynamicImage) -> Result<Diagnosis> {
        // the crop type names the per-crop disease model
        let crop_type = self
            .classifier
            .classify(CROP_TYPE_MODEL, image)?
            .trim()
            .to_lowercase();
        let label = self.classifier.classify(&crop_type, image)?;
        let disease = DiseaseLabel::from_label(&label)?;
        debug!(%crop_type, %disease, "disease classification");

        let advice = self.knowledge.lookup_infected(disease.as_str())?;
        Ok(Diagnosis::Infected {
            crop_type,
            disease,
            advice,
        })
    }
}
