//! Pipeline-related API endpoints

use async_trait::async_trait;
use conveyor_core::domain::pipeline::PipelineDefinition;
use conveyor_core::domain::run::RunRecord;
use conveyor_core::dto::pipeline::{PipelineRecord, PipelineSummary, RegisterFilePath};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::transport::Transport;

/// Characters escaped in a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const PIPELINES: &str = "/api/pipelines";

fn pipeline_path(name: &str) -> String {
    format!("{}/{}", PIPELINES, utf8_percent_encode(name, SEGMENT))
}

fn to_body<T: Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload)
        .map_err(|e| ClientError::ParseError(format!("Failed to encode request: {}", e)))
}

/// Typed endpoints, available on every [`Transport`]
#[async_trait]
pub trait PipelineApi: Transport {
    // =============================================================================
    // Pipeline Management
    // =============================================================================

    /// List registered pipelines
    ///
    /// # Returns
    /// Summaries as sent by the server; a `null` body is an empty list
    async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        self.request(Method::GET, PIPELINES, None)
            .await
            .decode_or_default()
    }

    /// Get the full definition of a pipeline
    ///
    /// # Returns
    /// `None` if the server answered successfully with no body
    async fn get_pipeline(&self, name: &str) -> Result<Option<PipelineRecord>> {
        self.request(Method::GET, &pipeline_path(name), None)
            .await
            .decode_or_default()
    }

    /// Register a new pipeline
    ///
    /// The definition is validated first; nothing is sent if it is invalid.
    ///
    /// # Example
    /// ```no_run
    /// # use conveyor_client::{ConveyorClient, PipelineApi};
    /// # use conveyor_core::domain::{PipelineDefinition, StageDefinition};
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = ConveyorClient::new("http://localhost:8080");
    /// let pipeline = PipelineDefinition::new("build", vec![StageDefinition::new("compile", "make")]);
    /// let msg = client.create_pipeline(&pipeline).await?;
    /// println!("{}", msg);
    /// # Ok(())
    /// # }
    /// ```
    async fn create_pipeline(&self, pipeline: &PipelineDefinition) -> Result<String> {
        let body = to_body(&pipeline.to_create_payload()?)?;
        self.request(Method::POST, &format!("{}/register/json", PIPELINES), Some(body))
            .await
            .message()
    }

    /// Replace the definition of an existing pipeline, addressed by its name
    async fn update_pipeline(&self, pipeline: &PipelineDefinition) -> Result<String> {
        let body = to_body(&pipeline.to_update_payload()?)?;
        self.request(Method::PATCH, &pipeline_path(&pipeline.name), Some(body))
            .await
            .message()
    }

    /// Delete a pipeline
    ///
    /// # Returns
    /// The server's confirmation message
    async fn delete_pipeline(&self, name: &str) -> Result<String> {
        let path = format!(
            "{}/register/{}",
            PIPELINES,
            utf8_percent_encode(name, SEGMENT)
        );
        self.request(Method::DELETE, &path, None).await.message()
    }

    /// Register a pipeline from a definition file on the server's disk
    async fn register_filepath(&self, req: &RegisterFilePath) -> Result<String> {
        let body = to_body(req)?;
        self.request(Method::POST, &format!("{}/register/filepath", PIPELINES), Some(body))
            .await
            .message()
    }

    // =============================================================================
    // Runs
    // =============================================================================

    /// Run history of a pipeline, in the order the server sends it
    async fn list_runs(&self, name: &str) -> Result<Vec<RunRecord>> {
        self.request(Method::GET, &format!("{}/runs", pipeline_path(name)), None)
            .await
            .decode_or_default()
    }

    /// Start a run
    async fn launch_pipeline(&self, name: &str) -> Result<String> {
        self.request(Method::POST, &pipeline_path(name), None)
            .await
            .message()
    }

    /// Cancel the active run
    async fn cancel_pipeline(&self, name: &str) -> Result<String> {
        self.request(Method::DELETE, &pipeline_path(name), None)
            .await
            .message()
    }

    // =============================================================================
    // Server
    // =============================================================================

    /// Server version string
    async fn version(&self) -> Result<String> {
        let json = self.request(Method::GET, "/api/version", None).await.into_result()?;
        json.get("version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::ParseError("Response has no version".to_string()))
    }
}

impl<T: Transport> PipelineApi for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Envelope;
    use crate::transport::fake::FakeTransport;
    use conveyor_core::domain::stage::StageDefinition;
    use serde_json::json;

    fn pipeline(name: &str) -> PipelineDefinition {
        PipelineDefinition::new(name, vec![StageDefinition::new("compile", "make")])
    }

    #[test]
    fn test_pipeline_path_encodes_segment() {
        assert_eq!(pipeline_path("build"), "/api/pipelines/build");
        assert_eq!(pipeline_path("nightly build"), "/api/pipelines/nightly%20build");
        assert_eq!(pipeline_path("a/b?c"), "/api/pipelines/a%2Fb%3Fc");
    }

    #[tokio::test]
    async fn test_list_pipelines_null_is_empty() {
        let transport = FakeTransport::new([Envelope::ok(Value::Null)]);
        assert!(transport.list_pipelines().await.unwrap().is_empty());

        let call = &transport.calls()[0];
        assert_eq!(call.method, Method::GET);
        assert_eq!(call.path, "/api/pipelines");
    }

    #[tokio::test]
    async fn test_create_posts_register_payload() {
        let transport = FakeTransport::new([Envelope::ok(json!({"msg": "Pipeline registered"}))]);

        let msg = transport.create_pipeline(&pipeline("build")).await.unwrap();
        assert_eq!(msg, "Pipeline registered");

        let call = &transport.calls()[0];
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.path, "/api/pipelines/register/json");
        let body = call.body.as_ref().unwrap();
        assert_eq!(body["pipeline"]["name"], "build");
        assert_eq!(body["variables"], json!({}));
    }

    #[tokio::test]
    async fn test_invalid_definition_is_never_sent() {
        let transport = FakeTransport::default();
        let err = transport
            .create_pipeline(&PipelineDefinition::new("empty", vec![]))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Invalid(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_patches_by_name() {
        let transport = FakeTransport::new([Envelope::ok(json!({"msg": "updated"}))]);
        transport.update_pipeline(&pipeline("my build")).await.unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.method, Method::PATCH);
        assert_eq!(call.path, "/api/pipelines/my%20build");
        assert_eq!(call.body.as_ref().unwrap()["name"], "my build");
    }

    #[tokio::test]
    async fn test_delete_and_run_control_routes() {
        let transport = FakeTransport::new([
            Envelope::ok(json!({"msg": "Pipeline deleted"})),
            Envelope::ok(json!({"msg": "launched"})),
            Envelope::ok(json!({"msg": "cancelled"})),
        ]);

        assert_eq!(transport.delete_pipeline("build").await.unwrap(), "Pipeline deleted");
        transport.launch_pipeline("build").await.unwrap();
        transport.cancel_pipeline("build").await.unwrap();

        let calls: Vec<_> = transport
            .calls()
            .into_iter()
            .map(|c| (c.method, c.path))
            .collect();
        assert_eq!(
            calls,
            vec![
                (Method::DELETE, "/api/pipelines/register/build".to_string()),
                (Method::POST, "/api/pipelines/build".to_string()),
                (Method::DELETE, "/api/pipelines/build".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_carries_server_message() {
        let transport = FakeTransport::new([Envelope::failed(Some(404), "Pipeline not found")]);
        let err = transport.get_pipeline("ghost").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Pipeline not found");
    }

    #[tokio::test]
    async fn test_list_runs_and_version() {
        let transport = FakeTransport::new([
            Envelope::ok(json!([{
                "startedAt": "2024-01-01T00:00:00Z",
                "endedAt": "2024-01-01T00:02:05Z",
                "successful": true,
                "stages": null
            }])),
            Envelope::ok(json!({"version": "1.2.0"})),
        ]);

        let runs = transport.list_runs("build").await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].stages.is_empty());
        assert_eq!(transport.calls()[0].path, "/api/pipelines/build/runs");

        assert_eq!(transport.version().await.unwrap(), "1.2.0");
    }
}
