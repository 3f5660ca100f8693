use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Deadline for each object-store and invoke call, in milliseconds
    pub upstream_timeout_ms: u64,
    pub storage: StorageConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// S3 bucket name (required when backend is s3)
    pub s3_bucket: Option<String>,
    pub aws_region: String,
    /// Endpoint override for LocalStack development
    pub aws_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ProcessingBackend {
    Lambda,
    Noop,
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub backend: ProcessingBackend,
    /// Lambda function that annotates uploaded images
    pub function_name: String,
    /// Endpoint override for LocalStack development
    pub lambda_endpoint: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            s3_bucket: None,
            aws_region: "us-east-1".to_string(),
            aws_endpoint: None,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            backend: ProcessingBackend::Noop,
            function_name: "image-processor".to_string(),
            lambda_endpoint: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10 * 1024 * 1024); // 10MB

        let upstream_timeout_ms = std::env::var("UPSTREAM_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30_000);

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "s3" => StorageBackend::S3,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let s3_bucket = std::env::var("S3_BUCKET").ok();
        let aws_region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let aws_endpoint = std::env::var("AWS_ENDPOINT").ok();

        let processing_backend = match std::env::var("PROCESSING_BACKEND")
            .unwrap_or_else(|_| "noop".to_string())
            .to_lowercase()
            .as_str()
        {
            "lambda" => ProcessingBackend::Lambda,
            _ => ProcessingBackend::Noop,
        };

        let function_name =
            std::env::var("LAMBDA_FUNCTION").unwrap_or_else(|_| "image-processor".to_string());
        let lambda_endpoint = std::env::var("AWS_LAMBDA_ENDPOINT").ok();

        let config = Config {
            bind_address,
            max_upload_size,
            upstream_timeout_ms,
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                s3_bucket,
                aws_region,
                aws_endpoint,
            },
            processing: ProcessingConfig {
                backend: processing_backend,
                function_name,
                lambda_endpoint,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.storage.backend, StorageBackend::S3) && self.storage.s3_bucket.is_none() {
            return Err(ConfigError::ValidationError(
                "S3_BUCKET is required when STORAGE_BACKEND=s3".to_string(),
            ));
        }

        if matches!(self.processing.backend, ProcessingBackend::Lambda)
            && self.processing.function_name.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "LAMBDA_FUNCTION cannot be empty when PROCESSING_BACKEND=lambda".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
