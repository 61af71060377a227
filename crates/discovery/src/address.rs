//! User-supplied device address

use crate::error::{DiscoveryError, Result};

/// Parse `IP:PORT` into its parts
///
/// # Errors
/// Missing colon, empty address or non-numeric port.
pub fn parse_device_address(input: &str) -> Result<(String, u16)> {
    let input = input.trim();
    let (address, port) = input
        .rsplit_once(':')
        .ok_or_else(|| DiscoveryError::invalid_address(input, "missing ':' separator"))?;

    if address.is_empty() {
        return Err(DiscoveryError::invalid_address(input, "empty address"));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| DiscoveryError::invalid_address(input, format!("invalid port: {e}")))?;

    Ok((address.to_string(), port))
}
