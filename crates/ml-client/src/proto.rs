//! Protobuf messages of the `generation.TextGenerator` service.
//!
//! Declared with prost derives so the crate builds without `protoc`; the
//! field numbers follow `proto/generation.proto`.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TokenRow {
    #[prost(uint32, repeated, tag = "1")]
    pub ids: Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GenerateRequest {
    #[prost(string, tag = "1")]
    pub model: String,
    #[prost(message, repeated, tag = "2")]
    pub input_ids: Vec<TokenRow>,
    #[prost(message, repeated, tag = "3")]
    pub attention_mask: Vec<TokenRow>,
    #[prost(uint32, tag = "4")]
    pub max_new_tokens: u32,
    #[prost(bool, tag = "5")]
    pub output_scores: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ScoreRow {
    #[prost(float, repeated, tag = "1")]
    pub values: Vec<f32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StepScores {
    #[prost(message, repeated, tag = "1")]
    pub rows: Vec<ScoreRow>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GenerateResponse {
    #[prost(message, repeated, tag = "1")]
    pub sequences: Vec<TokenRow>,
    #[prost(message, repeated, tag = "2")]
    pub scores: Vec<StepScores>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Example {
    #[prost(uint32, repeated, tag = "1")]
    pub input_ids: Vec<u32>,
    #[prost(uint32, repeated, tag = "2")]
    pub attention_mask: Vec<u32>,
    #[prost(uint32, repeated, tag = "3")]
    pub labels: Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FineTuneRequest {
    #[prost(string, tag = "1")]
    pub model_name_or_path: String,
    #[prost(string, tag = "2")]
    pub output_dir: String,
    #[prost(message, repeated, tag = "3")]
    pub train: Vec<Example>,
    #[prost(message, repeated, tag = "4")]
    pub eval: Vec<Example>,
    #[prost(string, tag = "5")]
    pub training_args_json: String,
    #[prost(uint64, tag = "6")]
    pub seed: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FineTuneResponse {
    #[prost(string, repeated, tag = "1")]
    pub checkpoints: Vec<String>,
    #[prost(string, tag = "2")]
    pub metrics_json: String,
}

/// Fully qualified RPC paths
pub const GENERATE_PATH: &str = "/generation.TextGenerator/Generate";
pub const FINE_TUNE_PATH: &str = "/generation.TextGenerator/FineTune";

