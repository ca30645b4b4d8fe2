//! Caller identifier derivation.

/// Sentinel identifier used when request metadata carries no address.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the source address from proxy headers.
///
/// Takes the first entry of the forwarded-for chain, else the real-IP header,
/// else [`UNKNOWN_CLIENT`]. Never fails.
pub fn client_address(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    let forwarded = forwarded_for
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|addr| !addr.is_empty());

    let real = real_ip.map(str::trim).filter(|addr| !addr.is_empty());

    forwarded
        .or(real)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Case-fold and trim a claimed identity (usually an email).
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}
