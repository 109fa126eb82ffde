//! gRPC client for the `generation.TextGenerator` service.

use crate::proto::{
    self, Example, FineTuneRequest, FineTuneResponse, GenerateRequest, GenerateResponse, TokenRow,
};
use crate::{
    FineTuneJob, FineTuneReport, FineTuner, GenerationBatch, GenerationOutput, GenerationParams,
    Generator, MLClientError, Result, TrainingExample,
};
use anyhow::Context;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tracing::{debug, error, info};

/// Full-vocabulary scores for a batch easily exceed tonic's 4 MiB default
const MAX_DECODING_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Client for the model service.
///
/// Cloning is cheap: clones share the underlying channel.
#[derive(Clone)]
pub struct TextGeneratorClient {
    grpc: Grpc<Channel>,
    service_addr: String,
    model: String,
}

impl TextGeneratorClient {
    /// Connect to the model service.
    ///
    /// # Arguments
    /// * `addr` - Address of the gRPC service (e.g., "http://localhost:50051")
    /// * `model` - Checkpoint directory or model name generation runs with
    pub async fn connect(addr: impl Into<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        let addr = addr.into();
        info!("Connecting to model service at {}", addr);

        let channel = Channel::from_shared(addr.clone())
            .context("Creating channel from address")?
            .connect()
            .await
            .context("Connecting to model service")?;

        Ok(Self::from_channel(channel, addr, model))
    }

    pub fn from_channel(channel: Channel, addr: impl Into<String>, model: impl Into<String>) -> Self {
        let grpc = Grpc::new(channel)
            .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_DECODING_MESSAGE_SIZE);
        Self {
            grpc,
            service_addr: addr.into(),
            model: model.into(),
        }
    }

    /// Get the address of the model service this client is connected to.
    pub fn service_address(&self) -> &str {
        &self.service_addr
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn unary<Req, Resp>(&self, request: Req, path: &'static str) -> std::result::Result<Resp, tonic::Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.grpc.clone();
        grpc.ready().await.map_err(|e| {
            tonic::Status::new(tonic::Code::Unavailable, format!("Service was not ready: {}", e))
        })?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(tonic::Request::new(request), PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}

fn is_connection_failure(status: &tonic::Status) -> bool {
    matches!(status.code(), tonic::Code::Unavailable)
}

fn to_request(model: &str, batch: &GenerationBatch, params: &GenerationParams) -> GenerateRequest {
    GenerateRequest {
        model: model.to_string(),
        input_ids: batch
            .input_ids
            .iter()
            .map(|ids| TokenRow { ids: ids.clone() })
            .collect(),
        attention_mask: batch
            .attention_mask
            .iter()
            .map(|mask| TokenRow {
                ids: mask.iter().map(|&m| u32::from(m)).collect(),
            })
            .collect(),
        max_new_tokens: params.max_new_tokens,
        output_scores: params.output_scores,
    }
}

fn from_response(response: GenerateResponse) -> GenerationOutput {
    GenerationOutput {
        sequences: response.sequences.into_iter().map(|row| row.ids).collect(),
        scores: response
            .scores
            .into_iter()
            .map(|step| step.rows.into_iter().map(|row| row.values).collect())
            .collect(),
    }
}

fn to_example(example: TrainingExample) -> Example {
    Example {
        input_ids: example.input_ids,
        attention_mask: example.attention_mask.into_iter().map(u32::from).collect(),
        labels: example.labels,
    }
}

#[tonic::async_trait]
impl Generator for TextGeneratorClient {
    async fn generate(
        &self,
        batch: &GenerationBatch,
        params: &GenerationParams,
    ) -> Result<GenerationOutput> {
        debug!(
            "Generating for a batch of {} prompts (max_new_tokens={})",
            batch.len(),
            params.max_new_tokens
        );
        let request = to_request(&self.model, batch, params);

        let response: GenerateResponse = self
            .unary(request, proto::GENERATE_PATH)
            .await
            .map_err(|status| {
                error!("gRPC error while generating: {}", status);
                if is_connection_failure(&status) {
                    MLClientError::ConnectionError(status.to_string())
                } else {
                    MLClientError::GenerationError(status.to_string())
                }
            })?;

        let output = from_response(response);
        if output.sequences.len() != batch.len() {
            error!(
                "Mismatch in number of sequences returned: expected {}, got {}",
                batch.len(),
                output.sequences.len()
            );
            return Err(MLClientError::InvalidResponse(
                "Number of sequences does not match batch size".into(),
            ));
        }
        output.validate(batch.len(), params.output_scores)?;
        Ok(output)
    }
}

#[tonic::async_trait]
impl FineTuner for TextGeneratorClient {
    async fn fine_tune(&self, job: FineTuneJob) -> Result<FineTuneReport> {
        info!(
            "Submitting fine-tuning of {} on {} train / {} eval examples",
            job.model_name_or_path,
            job.train.len(),
            job.eval.len()
        );
        let request = FineTuneRequest {
            model_name_or_path: job.model_name_or_path,
            output_dir: job.output_dir,
            train: job.train.into_iter().map(to_example).collect(),
            eval: job.eval.into_iter().map(to_example).collect(),
            training_args_json: job.training_args_json,
            seed: job.seed,
        };

        let response: FineTuneResponse = self
            .unary(request, proto::FINE_TUNE_PATH)
            .await
            .map_err(|status| {
                error!("gRPC error while fine-tuning: {}", status);
                if is_connection_failure(&status) {
                    MLClientError::ConnectionError(status.to_string())
                } else {
                    MLClientError::FineTuneError(status.to_string())
                }
            })?;

        Ok(FineTuneReport {
            checkpoints: response.checkpoints,
            metrics_json: response.metrics_json,
        })
    }
}
