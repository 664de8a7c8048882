use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::users::AvatarRef;

/// Externally hosted avatar images. The rest of the app only ever sees the
/// opaque `{id, url}` reference returned from `upload`.
#[async_trait]
pub trait AvatarHost: Send + Sync {
    async fn upload(&self, body: Bytes, content_type: &str) -> anyhow::Result<AvatarRef>;
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct S3AvatarHost {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl S3AvatarHost {
    pub async fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "static",
            ))
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl AvatarHost for S3AvatarHost {
    async fn upload(&self, body: Bytes, content_type: &str) -> anyhow::Result<AvatarRef> {
        let id = format!("avatars/{}", Uuid::new_v4());
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&id)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;

        let url = format!("{}/{}/{}", self.endpoint, self.bucket, id);
        Ok(AvatarRef { id, url })
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }
}
