use std::sync::Arc;

/// A thin wrapper around `rustls::ClientConfig` construction. Kept as its
/// own type (rather than handing `rustls::ClientConfig` straight to
/// `TokioBackend`) so `ConnectionPool`'s public API doesn't leak the TLS
/// crate's own builder types.
#[derive(Clone)]
pub struct TlsConfig {
    root_store: rustls::RootCertStore,
}

impl TlsConfig {
    /// Trusts the Mozilla root CA set bundled via `webpki-roots`.
    pub fn with_webpki_roots() -> TlsConfig {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
            rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));
        TlsConfig { root_store }
    }

    pub fn with_root_store(root_store: rustls::RootCertStore) -> TlsConfig {
        TlsConfig { root_store }
    }

    /// Builds a fresh `ClientConfig` with the given ALPN protocols offered.
    pub(crate) fn client_config(&self, alpn_protocols: &[Vec<u8>]) -> Arc<rustls::ClientConfig> {
        let mut config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(self.root_store.clone())
            .with_no_client_auth();
        config.alpn_protocols = alpn_protocols.to_vec();
        Arc::new(config)
    }
}
