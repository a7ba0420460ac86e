//! Stable Horde API schema definitions
//!
//! Only the async text-to-image subset: submit, check, and status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body for `POST /generate/async`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HordeGenerationRequest {
    pub prompt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    pub params: HordeParams,

    pub nsfw: bool,

    pub models: Vec<String>,

    pub r2: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HordeParams {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f32,
    pub sampler_name: String,
    pub n: u32,
}

/// Reply to a submitted job
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HordeSubmitResponse {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub kudos: Option<f64>,

    #[serde(default)]
    pub message: Option<String>,
}

/// Reply from `GET /generate/check/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HordeCheckResponse {
    #[serde(default)]
    pub done: bool,

    /// Estimated seconds until done
    #[serde(default)]
    pub wait_time: i64,

    #[serde(default)]
    pub queue_position: i64,

    #[serde(default)]
    pub processing: i64,

    #[serde(default)]
    pub finished: i64,

    #[serde(default)]
    pub faulted: bool,

    #[serde(default)]
    pub is_possible: Option<bool>,
}

/// Reply from `GET /generate/status/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HordeStatusResponse {
    #[serde(default)]
    pub generations: Vec<HordeGeneration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HordeGeneration {
    /// Image URL or base64 payload
    #[serde(default)]
    pub img: Option<String>,

    /// Seed as reported by the worker (usually a string)
    #[serde(default)]
    pub seed: Value,

    #[serde(default)]
    pub id: Option<String>,
}
