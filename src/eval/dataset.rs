//! Question/answer dataset loading.
//!
//! Expected format:
//! ```json
//! {
//!   "metadata": { "name": "corporate_tax_qa", "version": "1.0" },
//!   "questions": [
//!     {
//!       "id": "q1",
//!       "question": "What is the standard tax rate?",
//!       "difficulty": "easy",
//!       "category": "rates",
//!       "expected_answer": "9% above the threshold.",
//!       "expected_pages": [12, 13],
//!       "keywords": ["9%", "threshold"]
//!     }
//!   ]
//! }
//! ```

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A single evaluation question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier for this question.
    pub id: String,
    /// The question text sent to the retriever.
    pub question: String,
    /// Difficulty tag (`easy`, `medium`, `hard`).
    pub difficulty: String,
    /// Topic tag used for report breakdowns.
    pub category: String,
    /// Ground truth answer.
    pub expected_answer: String,
    /// Pages that hold the answer.
    #[serde(default)]
    pub expected_pages: Vec<u32>,
    /// Terms a relevant chunk should contain.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Dataset-level metadata; `name` is required, anything else is carried
/// through to reports untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_name() -> String {
    "unnamed".to_string()
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        Self {
            name: default_name(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A collection of evaluation questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub metadata: DatasetMetadata,
    pub questions: Vec<Question>,
}

impl Dataset {
    /// Create a new empty dataset.
    pub fn new(name: &str) -> Self {
        Self {
            metadata: DatasetMetadata {
                name: name.to_string(),
                ..Default::default()
            },
            questions: Vec::new(),
        }
    }

    /// Dataset name from its metadata.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Add a question to the dataset.
    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }

    /// Number of questions in the dataset.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Check if dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Load from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EvalError::DatasetNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            EvalError::Serialization(format!("Failed to parse dataset {:?}: {}", path, e))
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_question(id: &str, difficulty: &str, category: &str) -> Question {
    Question {
        id: id.to_string(),
        question: format!("What does question {} ask about tax groups?", id),
        difficulty: difficulty.to_string(),
        category: category.to_string(),
        expected_answer: "A tax group may be formed by resident persons.".to_string(),
        expected_pages: vec![3],
        keywords: vec!["tax group".to_string(), "resident".to_string()],
    }
}
