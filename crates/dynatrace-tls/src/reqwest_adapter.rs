// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::ClientBuilder;
use std::error::Error;
use std::path::PathBuf;
use tracing::debug;

/// How server certificates presented by the tenant are checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Verify against the platform/webpki roots.
    #[default]
    SystemRoots,
    /// Verify against the roots in a PEM bundle, in addition to the system roots.
    CaBundle(PathBuf),
    /// Skip certificate and hostname verification entirely.
    AcceptInvalid,
}

impl TlsVerification {
    /// Maps the add-on style settings (verify flag plus optional bundle path) to a mode.
    /// A bundle path wins over the flag.
    pub fn from_settings(verify: bool, ca_bundle: Option<PathBuf>) -> Self {
        match (verify, ca_bundle) {
            (_, Some(path)) => TlsVerification::CaBundle(path),
            (true, None) => TlsVerification::SystemRoots,
            (false, None) => TlsVerification::AcceptInvalid,
        }
    }
}

/// Installs the process-wide crypto provider. A no-op outside FIPS builds.
#[cfg(not(feature = "fips"))]
pub fn prepare_client_provider() -> Result<(), Box<dyn Error>> {
    Ok(())
}

/// Installs the AWS-LC FIPS provider as the rustls default. Must run before any client is built.
#[cfg(feature = "fips")]
pub fn prepare_client_provider() -> Result<(), Box<dyn Error>> {
    rustls::crypto::default_fips_provider()
        .install_default()
        .map_err(|e| format!("Failed to set up fips provider: {e:?}").into())
}

/// Creates a reqwest client builder with the requested certificate verification, on top of
/// reqwest's default rustls TLS implementation.
#[cfg(not(feature = "fips"))]
pub fn create_reqwest_client_builder(
    verification: &TlsVerification,
) -> Result<ClientBuilder, Box<dyn Error>> {
    let builder = reqwest::Client::builder().use_rustls_tls();
    match verification {
        TlsVerification::SystemRoots => Ok(builder),
        TlsVerification::CaBundle(path) => {
            let pem = std::fs::read(path)
                .map_err(|e| format!("Failed to read CA bundle {}: {e}", path.display()))?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem)?;
            if certs.is_empty() {
                return Err(format!("No certificates found in CA bundle {}", path.display()).into());
            }
            debug!(
                "Adding {} root certificates from {}",
                certs.len(),
                path.display()
            );
            Ok(certs
                .into_iter()
                .fold(builder, |builder, cert| builder.add_root_certificate(cert)))
        }
        TlsVerification::AcceptInvalid => Ok(builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)),
    }
}

/// Creates a reqwest client builder with FIPS-compliant TLS configuration.
/// Native root certificates are loaded, plus the optional CA bundle. Skipping verification
/// is refused in this mode.
#[cfg(feature = "fips")]
pub fn create_reqwest_client_builder(
    verification: &TlsVerification,
) -> Result<ClientBuilder, Box<dyn Error>> {
    use rustls::pki_types::{pem::PemObject, CertificateDer};

    if *verification == TlsVerification::AcceptInvalid {
        return Err("Certificate verification cannot be disabled in FIPS mode".into());
    }

    // The provider has to be installed at startup, e.g. with
    // rustls::crypto::default_fips_provider().install_default()
    let provider =
        rustls::crypto::CryptoProvider::get_default().ok_or("No crypto provider configured")?;

    if !provider.fips() {
        return Err("Crypto provider is not FIPS-compliant".into());
    }

    let mut root_cert_store = rustls::RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    let mut valid_count = 0;
    for cert in native_certs.certs {
        match root_cert_store.add(cert) {
            Ok(()) => valid_count += 1,
            Err(err) => {
                debug!("Failed to parse certificate: {:?}", err);
            }
        }
    }

    if let TlsVerification::CaBundle(path) = verification {
        let pem = std::fs::read(path)
            .map_err(|e| format!("Failed to read CA bundle {}: {e}", path.display()))?;
        for cert in CertificateDer::pem_slice_iter(&pem) {
            let cert = cert.map_err(|e| format!("Invalid PEM in {}: {e:?}", path.display()))?;
            root_cert_store
                .add(cert)
                .map_err(|e| format!("Invalid certificate in {}: {e}", path.display()))?;
            valid_count += 1;
        }
    }

    if valid_count == 0 {
        return Err("No valid certificates found in root store".into());
    }

    let versions = rustls::ALL_VERSIONS.to_vec();
    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&versions)
        .map_err(|_| "Failed to set protocol versions")?
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();

    if !config.fips() {
        return Err("The final TLS configuration is not FIPS-compliant".into());
    }
    debug!("Client builder is configured with FIPS.");

    Ok(reqwest::Client::builder().use_preconfigured_tls(config))
}

#[cfg(all(test, not(feature = "fips")))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_settings() {
        assert_eq!(
            TlsVerification::from_settings(true, None),
            TlsVerification::SystemRoots
        );
        assert_eq!(
            TlsVerification::from_settings(false, None),
            TlsVerification::AcceptInvalid
        );
        assert_eq!(
            TlsVerification::from_settings(false, Some(PathBuf::from("/tmp/ca.pem"))),
            TlsVerification::CaBundle(PathBuf::from("/tmp/ca.pem"))
        );
    }

    #[test]
    fn test_prepare_client_provider_is_noop() {
        assert!(prepare_client_provider().is_ok());
    }

    #[test]
    fn test_system_roots_builder_builds() {
        let builder = create_reqwest_client_builder(&TlsVerification::SystemRoots)
            .expect("builder should be created");
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_accept_invalid_builder_builds() {
        let builder = create_reqwest_client_builder(&TlsVerification::AcceptInvalid)
            .expect("builder should be created");
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_missing_ca_bundle_is_an_error() {
        let result = create_reqwest_client_builder(&TlsVerification::CaBundle(PathBuf::from(
            "/nonexistent/dynatrace/ca.pem",
        )));
        assert!(result.is_err());
    }

    #[test]
    fn test_ca_bundle_without_certificates_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"not a certificate\n").expect("write");
        let result =
            create_reqwest_client_builder(&TlsVerification::CaBundle(file.path().to_path_buf()));
        assert!(result.is_err());
    }
}
