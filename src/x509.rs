// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Extraction of the signing-relevant parts of an X.509 leaf certificate.

use x509_parser::{certificate::X509Certificate, der_parser::oid, oid_registry::Oid,
    prelude::FromDer};

use crate::{oids::DigestAlgorithm, Error, Result};

/// Key usage flags relevant for signing decisions.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct KeyUsageFlags {
    /// The `digitalSignature` bit.
    pub digital_signature: bool,

    /// The `contentCommitment` (née `nonRepudiation`) bit.
    pub content_commitment: bool,
}

/// The kind of public key found in the certificate's SPKI.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PublicKeyKind {
    /// An `rsaEncryption` key.
    Rsa,

    /// An `id-ecPublicKey` key on the named curve (DER OID content bytes).
    Ec {
        /// DER content bytes of the named-curve OID.
        curve: Vec<u8>,
    },
}

/// The signing-relevant view of a leaf certificate.
#[derive(Clone, Debug)]
pub struct SignerCertificate {
    der: Vec<u8>,
    issuer_der: Vec<u8>,
    serial_der: Vec<u8>,
    subject_common_name: String,
    key: PublicKeyKind,
    key_usage: Option<KeyUsageFlags>,
    eku_present: bool,
    eku_time_stamping_only: bool,
}

impl SignerCertificate {
    /// Parse a DER certificate and extract the fields this crate needs.
    pub fn parse(der: &[u8]) -> Result<Self> {
        let (_rem, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::CertInvalid(e.to_string()))?;

        let issuer_der = cert.tbs_certificate.issuer.as_raw().to_vec();
        let serial_der = cert.tbs_certificate.raw_serial().to_vec();

        let subject_common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| cert.subject().to_string());

        let spki = cert.public_key();
        let key = if spki.algorithm.algorithm == RSA_OID {
            PublicKeyKind::Rsa
        } else if spki.algorithm.algorithm == EC_PUBLICKEY_OID {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.as_oid().ok())
                .ok_or_else(|| {
                    Error::CertInvalid("EC key without a named curve".to_string())
                })?;
            PublicKeyKind::Ec {
                curve: curve.as_bytes().to_vec(),
            }
        } else {
            return Err(Error::CertInvalid(format!(
                "unsupported public key algorithm {}",
                spki.algorithm.algorithm
            )));
        };

        let key_usage = cert
            .key_usage()
            .map_err(|e| Error::CertInvalid(e.to_string()))?
            .map(|ku| KeyUsageFlags {
                digital_signature: ku.value.digital_signature(),
                content_commitment: ku.value.non_repudiation(),
            });

        let (eku_present, eku_time_stamping_only) = match cert
            .extended_key_usage()
            .map_err(|e| Error::CertInvalid(e.to_string()))?
        {
            Some(eku) => {
                let eku = eku.value;
                let only_tsa = eku.time_stamping
                    && !eku.any
                    && !eku.server_auth
                    && !eku.client_auth
                    && !eku.code_signing
                    && !eku.email_protection
                    && !eku.ocsp_signing
                    && eku.other.is_empty();
                (true, only_tsa)
            }
            None => (false, false),
        };

        Ok(Self {
            der: der.to_vec(),
            issuer_der,
            serial_der,
            subject_common_name,
            key,
            key_usage,
            eku_present,
            eku_time_stamping_only,
        })
    }

    /// The complete certificate DER.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Raw DER of the issuer `Name`, used verbatim for the CMS signer
    /// identifier and the ESS issuerSerial.
    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }

    /// Raw content bytes of the serial number INTEGER.
    pub fn serial_der(&self) -> &[u8] {
        &self.serial_der
    }

    /// Best-effort subject common name; falls back to the full subject DN.
    pub fn subject_common_name(&self) -> &str {
        &self.subject_common_name
    }

    /// The kind of public key carried by the certificate.
    pub fn public_key_kind(&self) -> &PublicKeyKind {
        &self.key
    }

    /// The digest recommended for this key: the curve-matched digest for EC
    /// keys, SHA-256 for RSA.
    pub fn recommended_digest(&self) -> Result<DigestAlgorithm> {
        match &self.key {
            PublicKeyKind::Rsa => Ok(DigestAlgorithm::Sha256),
            PublicKeyKind::Ec { curve } => DigestAlgorithm::for_curve(curve),
        }
    }

    /// Key usage flags, if the extension is present.
    pub fn key_usage(&self) -> Option<KeyUsageFlags> {
        self.key_usage
    }

    /// Whether the certificate permits content signing.
    ///
    /// False when key usage is present with neither `digitalSignature` nor
    /// `contentCommitment` set, or when the EKU list consists solely of
    /// `id-kp-timeStamping`. Certificates that fail this gate are still
    /// usable for document time stamps.
    pub fn can_sign(&self) -> bool {
        if let Some(ku) = &self.key_usage {
            if !ku.digital_signature && !ku.content_commitment {
                return false;
            }
        }
        if self.eku_present && self.eku_time_stamping_only {
            return false;
        }
        true
    }
}

const RSA_OID: Oid<'static> = oid!(1.2.840 .113549 .1 .1 .1);
const EC_PUBLICKEY_OID: Oid<'static> = oid!(1.2.840 .10045 .2 .1);
