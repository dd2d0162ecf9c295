//! Utility functions for chunkmaster

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// Validate object id (must be non-empty, reasonable length)
pub fn validate_object_id(id: &str) -> crate::Result<()> {
    if id.is_empty() {
        return Err(crate::Error::InvalidRequest(
            "object id cannot be empty".into(),
        ));
    }

    if id.len() > 1024 {
        return Err(crate::Error::InvalidRequest(
            "object id too long (max 1024 bytes)".into(),
        ));
    }

    if id.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidRequest(
            "object id contains invalid characters".into(),
        ));
    }

    Ok(())
}

/// Validate a chunkserver endpoint (absolute http(s) URL)
pub fn validate_endpoint(endpoint: &str) -> crate::Result<()> {
    if endpoint.trim().is_empty() {
        return Err(crate::Error::InvalidRequest(
            "endpoint cannot be empty".into(),
        ));
    }

    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(crate::Error::InvalidRequest(format!(
            "endpoint must start with http:// or https://: {}",
            endpoint
        )));
    }

    Ok(())
}
