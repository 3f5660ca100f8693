use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_lambda::config::Builder as LambdaConfigBuilder;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_lambda::Client;
use chrono::Utc;

use super::{InvokeError, ProcessingInvoker};

/// AWS Lambda invoker for the image annotation function.
pub struct LambdaInvoker {
    client: Client,
    function_name: String,
    bucket: String,
}

impl LambdaInvoker {
    pub async fn new(
        function_name: &str,
        bucket: &str,
        region: &str,
        endpoint_url: Option<&str>,
    ) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = LambdaConfigBuilder::from(&aws_config);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            function_name: function_name.to_string(),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ProcessingInvoker for LambdaInvoker {
    async fn trigger(&self, asset_id: &str, storage_key: &str) -> Result<(), InvokeError> {
        let payload = serde_json::json!({
            "imageId": asset_id,
            "s3Key": storage_key,
            "bucket": self.bucket,
            "timestamp": Utc::now().to_rfc3339(),
        });

        self.client
            .invoke()
            .function_name(&self.function_name)
            // Event = asynchronous invocation; Lambda queues the request and
            // returns without waiting for the function to run.
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload.to_string().into_bytes()))
            .send()
            .await
            .map_err(|e| InvokeError::Failed(format!("Lambda invoke failed: {e}")))?;

        tracing::debug!(
            asset_id = %asset_id,
            key = %storage_key,
            function = %self.function_name,
            "Triggered processing"
        );
        Ok(())
    }
}
