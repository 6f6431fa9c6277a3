//! Trusted key resolution for artifact verification
//!
//! The embedded release key is the default trust anchor. A configured
//! override URI supports self-hosted registries: when the override is
//! fetched successfully it replaces the embedded key entirely (fail
//! closed), but a failed fetch falls back to the embedded key rather than
//! blocking the upgrade.

use serde::Deserialize;
use warden_events::{EventEmitter, EventSender};
use warden_net::{fetch_text, NetClient};
use warden_signing::PublicKeyRef;

/// Key file served by a signing-key override URI
#[derive(Debug, Deserialize)]
struct KeyOverride {
    keys: Vec<PublicKeyRef>,
}

/// Resolve the trusted key set for this upgrade.
pub async fn resolve_trusted_keys(
    net: &NetClient,
    override_uri: Option<&str>,
    tx: &EventSender,
) -> Vec<PublicKeyRef> {
    let Some(uri) = override_uri else {
        return PublicKeyRef::embedded();
    };

    match fetch_text(net, uri, tx).await {
        Ok(content) => match serde_json::from_str::<KeyOverride>(&content) {
            Ok(key_override) if !key_override.keys.is_empty() => {
                tx.emit_debug(format!(
                    "using {} signing keys from {uri}",
                    key_override.keys.len()
                ));
                key_override.keys
            }
            Ok(_) | Err(_) => {
                tx.emit_warning(format!(
                    "signing key override at {uri} is unusable, falling back to embedded key"
                ));
                PublicKeyRef::embedded()
            }
        },
        Err(e) => {
            tx.emit_warning(format!(
                "fetching signing key override from {uri} failed ({e}), falling back to embedded key"
            ));
            PublicKeyRef::embedded()
        }
    }
}
