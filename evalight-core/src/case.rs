// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};

/// A single evaluation unit loaded from the input dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Case {
    /// Ordinal position in the dataset
    pub index: usize,

    /// Optional identifier carried through from the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The question or prompt given to the model
    pub question: String,

    /// The model response under evaluation
    pub response: String,

    /// Ground-truth answer, may be empty
    #[serde(default)]
    pub reference: String,
}

impl Case {
    /// Create a new case
    pub fn new(
        index: usize,
        question: impl Into<String>,
        response: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            index,
            id: None,
            question: question.into(),
            response: response.into(),
            reference: reference.into(),
        }
    }

    /// Attach an external identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn has_reference(&self) -> bool {
        !self.reference.trim().is_empty()
    }

    pub fn has_response(&self) -> bool {
        !self.response.trim().is_empty()
    }
}
