use tracing::{debug, info};

use crate::config::AwsBaseConfig;

/// Build an AWS SDK configuration from an [`AwsBaseConfig`].
///
/// Credentials come from the environment chain. When `role_arn` is set the
/// base credentials are exchanged through STS, and the SDK refreshes them
/// before they expire.
pub async fn build_sdk_config(config: &AwsBaseConfig) -> aws_config::SdkConfig {
    let region = aws_config::Region::new(config.region.clone());
    let mut loader = aws_config::from_env().region(region.clone());

    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom AWS endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    let Some(role_arn) = &config.role_arn else {
        return loader.load().await;
    };

    let session_name = config.session_name.as_deref().unwrap_or("vellum");
    info!(session_name = %session_name, "assuming IAM role via STS");

    let base = loader.load().await;
    let provider = aws_config::sts::AssumeRoleProvider::builder(role_arn)
        .session_name(session_name)
        .region(region.clone())
        .configure(&base)
        .build()
        .await;

    let mut assumed = aws_config::from_env()
        .region(region)
        .credentials_provider(provider);
    if let Some(endpoint) = &config.endpoint_url {
        assumed = assumed.endpoint_url(endpoint);
    }
    assumed.load().await
}
