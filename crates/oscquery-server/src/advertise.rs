//! mDNS advertisement
//!
//! Registers the server as an `_oscjson._tcp` service. Service names are
//! sanitized to the RFC 6763 instance-name subset before registration.

use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::info;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};
use uuid::Uuid;

use oscquery_core::OSCJSON_SERVICE_TYPE;

use crate::error::{Result, ServerError};

/// Longest instance name that still fits once `._oscjson._tcp` is appended
const MAX_NAME_BYTES: usize = 242;

/// Maximum bytes per DNS label
const MAX_LABEL_BYTES: usize = 63;

/// Sanitize a service name for mDNS registration.
///
/// Unicode NFD decomposition with combining marks stripped, restricted to
/// `[A-Za-z0-9-]` and `.`; each label has runs of `-` collapsed, leading
/// and trailing `-` removed, and is capped at 63 bytes. Empty results fall
/// back to a generated name.
pub fn sanitize_service_name(raw: &str) -> String {
    let restricted: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
        .collect();

    let mut labels = Vec::new();
    for label in restricted.split('.') {
        let mut collapsed = String::with_capacity(label.len());
        let mut prev_dash = false;
        for c in label.chars() {
            if c == '-' {
                if !prev_dash {
                    collapsed.push('-');
                }
                prev_dash = true;
            } else {
                collapsed.push(c);
                prev_dash = false;
            }
        }
        let mut label = collapsed.trim_matches('-').to_string();
        label.truncate(MAX_LABEL_BYTES);
        if !label.is_empty() {
            labels.push(label);
        }
    }

    let mut name = labels.join(".");
    if name.is_empty() {
        name = format!("OSCQuery-{}", Uuid::new_v4().simple());
    }
    name.truncate(MAX_NAME_BYTES);
    while name.ends_with('-') || name.ends_with('.') {
        name.pop();
    }
    name
}

/// Owns the mDNS daemon and the registered service lifetime
pub struct ServiceAdvertiser {
    daemon: ServiceDaemon,
    fullname: Option<String>,
}

impl ServiceAdvertiser {
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new().map_err(|e| ServerError::Mdns(e.to_string()))?;
        Ok(Self {
            daemon,
            fullname: None,
        })
    }

    /// Register `name` as an `_oscjson._tcp` service on `port`.
    /// `host_override`, when set, replaces the derived hostname.
    pub fn advertise(&mut self, name: &str, host_override: Option<&str>, port: u16) -> Result<()> {
        // mdns-sd only accepts fully-qualified `.local.` hostnames
        let hostname = match host_override {
            Some(host) => format!("{}.local.", host.trim_end_matches('.')),
            None => format!("{}._oscjson._tcp.local.", name),
        };

        let properties: &[(&str, &str)] = &[("txtvers", "1")];
        let service = ServiceInfo::new(OSCJSON_SERVICE_TYPE, name, &hostname, "", port, properties)
            .map_err(|e| ServerError::Mdns(e.to_string()))?
            .enable_addr_auto();

        self.fullname = Some(service.get_fullname().to_string());
        self.daemon
            .register(service)
            .map_err(|e| ServerError::Mdns(e.to_string()))?;

        info!("advertising _oscjson._tcp service {} on port {}", name, port);
        Ok(())
    }

    /// Withdraw the advertisement and shut the daemon down
    pub fn stop(&mut self) -> Result<()> {
        if let Some(fullname) = self.fullname.take() {
            self.daemon
                .unregister(&fullname)
                .map_err(|e| ServerError::Mdns(e.to_string()))?;
        }
        let _ = self.daemon.shutdown();
        Ok(())
    }
}

impl Drop for ServiceAdvertiser {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
