use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{CropSegError, Result};
use crate::traits::KnowledgeBase;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthyAdvice {
    #[serde(default)]
    pub precautions: Vec<String>,
    #[serde(default)]
    pub fertilizers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfectedAdvice {
    #[serde(default)]
    pub prevention_remedies: Vec<String>,
}

/// On-disk layout of the advice store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeData {
    #[serde(default)]
    pub healthy: HashMap<String, HealthyAdvice>,
    #[serde(default)]
    pub infected: HashMap<String, InfectedAdvice>,
}

/// Case-insensitive advice lookup held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKnowledgeBase {
    healthy: HashMap<String, HealthyAdvice>,
    infected: HashMap<String, InfectedAdvice>,
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl InMemoryKnowledgeBase {
    pub fn new(data: KnowledgeData) -> Self {
        Self {
            healthy: data
                .healthy
                .into_iter()
                .map(|(k, v)| (key(&k), v))
                .collect(),
            infected: data
                .infected
                .into_iter()
                .map(|(k, v)| (key(&k), v))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CropSegError::FileSystem {
            path: path.to_path_buf(),
            operation: "read knowledge base".to_string(),
            source: e,
        })?;
        Self::from_json(&json)
    }

    pub fn with_healthy(mut self, crop: &str, advice: HealthyAdvice) -> Self {
        self.healthy.insert(key(crop), advice);
        self
    }

    pub fn with_infected(mut self, disease: &str, advice: InfectedAdvice) -> Self {
        self.infected.insert(key(disease), advice);
        self
    }
}

impl KnowledgeBase for InMemoryKnowledgeBase {
    fn lookup_healthy(&self, crop_name: &str) -> Result<HealthyAdvice> {
        self.healthy
            .get(&key(crop_name))
            .cloned()
            .ok_or_else(|| CropSegError::Lookup {
                kind: "healthy crop".to_string(),
                key: crop_name.to_string(),
            })
    }

    fn lookup_infected(&self, disease_name: &str) -> Result<InfectedAdvice> {
        self.infected
            .get(&key(disease_name))
            .cloned()
            .ok_or_else(|| CropSegError::Lookup {
                kind: "disease".to_string(),
                key: disease_name.to_string(),
            })
    }
}
