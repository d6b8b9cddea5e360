use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    ContinueGenerateRequest, ContinueGenerateResponse, InitialGenerateRequest,
    InitialGenerateResponse,
};

/// The remote generation service, as seen by the orchestrator.
///
/// Implementations perform exactly one round trip per call. Whether a failed
/// call is retried is up to the implementation's own transport policy.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn initial_generate(
        &self,
        request: &InitialGenerateRequest,
    ) -> Result<InitialGenerateResponse>;

    async fn continue_generate(
        &self,
        request: &ContinueGenerateRequest,
    ) -> Result<ContinueGenerateResponse>;
}
