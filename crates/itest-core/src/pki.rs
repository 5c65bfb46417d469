//! Throwaway X.509 material for Icinga 2 cluster setups.
//!
//! A [`Ca`] is self-signed and issues leaf certificates whose common name
//! and only DNS name are the node name, which is what Icinga 2 expects from
//! cluster endpoints. Keys are ECDSA P-256. Validity uses the generator's
//! defaults, which outlive any test run by centuries.

use std::fmt;
use std::path::Path;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CertificateSigningRequestParams,
    DistinguishedName, DnType, IsCa, KeyPair, SerialNumber,
};
use tracing::debug;

use crate::error::Result;

/// Common name of every generated CA.
pub const CA_COMMON_NAME: &str = "Icinga CA";

/// A certificate together with the key it was issued for.
pub struct CertificateWithKey {
    subject: String,
    key: KeyPair,
    certificate: Certificate,
    request_pem: Option<String>,
}

impl CertificateWithKey {
    /// Common name of the certificate.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// DER encoding of the certificate.
    pub fn der(&self) -> &[u8] {
        self.certificate.der()
    }

    /// The certificate as a `CERTIFICATE` PEM block.
    pub fn to_pem(&self) -> String {
        self.certificate.pem()
    }

    /// The private key as a PKCS#8 `PRIVATE KEY` PEM block.
    pub fn key_to_pem(&self) -> String {
        self.key.serialize_pem()
    }

    /// The signing request the certificate was issued from, as a
    /// `CERTIFICATE REQUEST` PEM block. A CA has none.
    pub fn request_to_pem(&self) -> Option<&str> {
        self.request_pem.as_deref()
    }

    /// Writes [`to_pem`](Self::to_pem) to `path` with permission bits `mode`.
    pub fn to_file(&self, path: impl AsRef<Path>, mode: u32) -> Result<()> {
        write_pem(path.as_ref(), &self.to_pem(), mode)
    }

    /// Writes [`key_to_pem`](Self::key_to_pem) to `path` with permission bits `mode`.
    pub fn key_to_file(&self, path: impl AsRef<Path>, mode: u32) -> Result<()> {
        write_pem(path.as_ref(), &self.key_to_pem(), mode)
    }

    /// Writes the signing request to `path`. Does nothing for a CA.
    pub fn request_to_file(&self, path: impl AsRef<Path>, mode: u32) -> Result<()> {
        match &self.request_pem {
            Some(pem) => write_pem(path.as_ref(), pem, mode),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for CertificateWithKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateWithKey")
            .field("subject", &self.subject)
            .field("has_request", &self.request_pem.is_some())
            .finish_non_exhaustive()
    }
}

/// A self-signed certificate authority.
#[derive(Debug)]
pub struct Ca {
    inner: CertificateWithKey,
}

impl Ca {
    /// Generates a key and a self-signed CA certificate for it.
    pub fn new() -> Result<Self> {
        let key = KeyPair::generate()?;
        let mut params = CertificateParams::default();
        params.distinguished_name = common_name(CA_COMMON_NAME);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.serial_number = Some(random_serial());
        let certificate = params.self_signed(&key)?;
        debug!(subject = CA_COMMON_NAME, "generated CA");
        Ok(Self {
            inner: CertificateWithKey {
                subject: CA_COMMON_NAME.to_string(),
                key,
                certificate,
                request_pem: None,
            },
        })
    }

    /// The CA's own certificate and key.
    pub fn certificate(&self) -> &CertificateWithKey {
        &self.inner
    }

    /// Issues a certificate for `subject` with a fresh key. The signing
    /// request is kept for [`CertificateWithKey::request_to_pem`].
    pub fn new_certificate(&self, subject: &str) -> Result<CertificateWithKey> {
        let key = KeyPair::generate()?;
        let mut params = CertificateParams::new(vec![subject.to_string()])?;
        params.distinguished_name = common_name(subject);
        params.is_ca = IsCa::ExplicitNoCa;
        params.serial_number = Some(random_serial());

        let request_pem = params.serialize_request(&key)?.pem()?;
        let certificate = params.signed_by(&key, &self.inner.certificate, &self.inner.key)?;
        debug!(subject, "issued certificate");
        Ok(CertificateWithKey {
            subject: subject.to_string(),
            key,
            certificate,
            request_pem: Some(request_pem),
        })
    }

    /// Signs a PEM-encoded request and returns the certificate as PEM.
    pub fn sign_csr(&self, request_pem: &str) -> Result<String> {
        let mut request = CertificateSigningRequestParams::from_pem(request_pem)?;
        request.params.is_ca = IsCa::ExplicitNoCa;
        request.params.serial_number = Some(random_serial());
        let certificate = request.signed_by(&self.inner.certificate, &self.inner.key)?;
        Ok(certificate.pem())
    }
}

fn common_name(name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name);
    dn
}

/// 127 random bits; the top bit stays clear so the DER integer is positive.
fn random_serial() -> SerialNumber {
    let mut bytes = *uuid::Uuid::new_v4().as_bytes();
    bytes[0] &= 0x7f;
    SerialNumber::from_slice(&bytes)
}

#[cfg_attr(not(unix), allow(unused_variables))]
fn write_pem(path: &Path, pem: &str, mode: u32) -> Result<()> {
    std::fs::write(path, pem)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}
