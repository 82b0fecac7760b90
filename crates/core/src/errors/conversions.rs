//! Conversions from collaborator error types

use super::types::PipelineError;

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::new("json", error.to_string())
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(error: anyhow::Error) -> Self {
        let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
        let converted = PipelineError::new("external", error.to_string());
        if chain.is_empty() {
            converted
        } else {
            converted.with_context("sources", chain)
        }
    }
}
