use std::time::Duration;

/// Path of the content store upload endpoint, relative to the API base URL.
pub const STORE_PATH: &str = "/storage/store";

/// Upper bound for the encoded size of one batch (10 MiB).
pub const DEFAULT_MAX_BATCH_BYTES: u64 = 10 * 1024 * 1024;

/// Payload ceiling observed on the registration endpoint (10 MiB).
///
/// The endpoint rejects larger bodies. Whether a second registration call
/// appends to or replaces the first is not confirmed, so callers must not
/// rely on merging.
pub const REGISTRATION_PAYLOAD_LIMIT: u64 = 10 * 1024 * 1024;

/// Largest text asset that is embedded inline in the descriptor (64 KiB).
pub const DEFAULT_INLINE_THRESHOLD: u64 = 64 * 1024;

/// Timeout for a single store request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of uploads allowed in flight at once.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Content type used when nothing more specific is known.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
