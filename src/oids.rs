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

//! Object identifiers and digest-algorithm lookup tables used across the
//! CMS, TSP, and X.509 code paths.

use bcder::{ConstOid, Oid};
use bytes::Bytes;
use sha2::Digest;

use crate::{Error, Result};

/// Content type `id-data`.
///
/// 1.2.840.113549.1.7.1
pub const OID_ID_DATA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 7, 1]);

/// Content type `id-signedData`.
///
/// 1.2.840.113549.1.7.2
pub const OID_ID_SIGNED_DATA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 7, 2]);

/// Content type for Time-Stamp Token Info (`id-ct-TSTInfo`).
///
/// 1.2.840.113549.1.9.16.1.4
pub const OID_CONTENT_TYPE_TST_INFO: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 16, 1, 4]);

/// Signed attribute `content-type`.
///
/// 1.2.840.113549.1.9.3
pub const OID_CONTENT_TYPE: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 3]);

/// Signed attribute `message-digest`.
///
/// 1.2.840.113549.1.9.4
pub const OID_MESSAGE_DIGEST: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 4]);

/// Signed attribute `id-aa-signingCertificateV2` (RFC 5035).
///
/// 1.2.840.113549.1.9.16.2.47
pub const OID_SIGNING_CERTIFICATE_V2: ConstOid =
    Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 16, 2, 47]);

/// Unsigned attribute `id-aa-timeStampToken` (signature time stamp).
///
/// 1.2.840.113549.1.9.16.2.14
pub const OID_SIGNATURE_TIME_STAMP: ConstOid =
    Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 16, 2, 14]);

/// Digest algorithm SHA-256.
///
/// 2.16.840.1.101.3.4.2.1
pub const OID_SHA256: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 1]);

/// Digest algorithm SHA-384.
///
/// 2.16.840.1.101.3.4.2.2
pub const OID_SHA384: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 2]);

/// Digest algorithm SHA-512.
///
/// 2.16.840.1.101.3.4.2.3
pub const OID_SHA512: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 3]);

/// Public key algorithm `rsaEncryption`.
///
/// 1.2.840.113549.1.1.1
pub const OID_RSA_ENCRYPTION: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 1]);

/// Signature algorithm `sha256WithRSAEncryption`.
///
/// 1.2.840.113549.1.1.11
pub const OID_SHA256_WITH_RSA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 11]);

/// Signature algorithm `sha384WithRSAEncryption`.
///
/// 1.2.840.113549.1.1.12
pub const OID_SHA384_WITH_RSA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 12]);

/// Signature algorithm `sha512WithRSAEncryption`.
///
/// 1.2.840.113549.1.1.13
pub const OID_SHA512_WITH_RSA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 13]);

/// Public key algorithm `id-ecPublicKey`.
///
/// 1.2.840.10045.2.1
pub const OID_EC_PUBLIC_KEY: ConstOid = Oid(&[42, 134, 72, 206, 61, 2, 1]);

/// Signature algorithm `ecdsa-with-SHA256`.
///
/// 1.2.840.10045.4.3.2
pub const OID_ECDSA_WITH_SHA256: ConstOid = Oid(&[42, 134, 72, 206, 61, 4, 3, 2]);

/// Signature algorithm `ecdsa-with-SHA384`.
///
/// 1.2.840.10045.4.3.3
pub const OID_ECDSA_WITH_SHA384: ConstOid = Oid(&[42, 134, 72, 206, 61, 4, 3, 3]);

/// Signature algorithm `ecdsa-with-SHA512`.
///
/// 1.2.840.10045.4.3.4
pub const OID_ECDSA_WITH_SHA512: ConstOid = Oid(&[42, 134, 72, 206, 61, 4, 3, 4]);

/// Named curve `prime256v1` (NIST P-256).
///
/// 1.2.840.10045.3.1.7
pub const OID_PRIME256V1: ConstOid = Oid(&[42, 134, 72, 206, 61, 3, 1, 7]);

/// Named curve `secp384r1` (NIST P-384).
///
/// 1.3.132.0.34
pub const OID_SECP384R1: ConstOid = Oid(&[43, 129, 4, 0, 34]);

/// Named curve `secp521r1` (NIST P-521).
///
/// 1.3.132.0.35
pub const OID_SECP521R1: ConstOid = Oid(&[43, 129, 4, 0, 35]);

/// Extended key usage `id-kp-timeStamping`.
///
/// 1.3.6.1.5.5.7.3.8
pub const OID_KP_TIME_STAMPING: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 3, 8]);

/// The digest algorithms supported for byte-range hashing, message imprints,
/// and ESS certificate hashes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DigestAlgorithm {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Look up a digest algorithm by its lowercase name.
    ///
    /// Unknown names fail with [`Error::UnsupportedAlgorithm`].
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(format!("digest {name}"))),
        }
    }

    /// The recommended digest for a named EC curve, identified by the DER
    /// content bytes of its OID.
    ///
    /// P-256 pairs with SHA-256, P-384 with SHA-384, and P-521 with SHA-512.
    pub fn for_curve(curve: &[u8]) -> Result<Self> {
        if curve == OID_PRIME256V1.0 {
            Ok(Self::Sha256)
        } else if curve == OID_SECP384R1.0 {
            Ok(Self::Sha384)
        } else if curve == OID_SECP521R1.0 {
            Ok(Self::Sha512)
        } else {
            Err(Error::UnsupportedAlgorithm(format!(
                "EC curve {}",
                hex::encode(curve)
            )))
        }
    }

    /// The OID identifying this digest algorithm.
    pub fn oid(&self) -> ConstOid {
        match self {
            Self::Sha256 => OID_SHA256,
            Self::Sha384 => OID_SHA384,
            Self::Sha512 => OID_SHA512,
        }
    }

    /// The RSASSA-PKCS1-v1_5 signature algorithm OID pairing this digest
    /// with an RSA key.
    pub fn rsa_signature_oid(&self) -> ConstOid {
        match self {
            Self::Sha256 => OID_SHA256_WITH_RSA,
            Self::Sha384 => OID_SHA384_WITH_RSA,
            Self::Sha512 => OID_SHA512_WITH_RSA,
        }
    }

    /// The ECDSA signature algorithm OID pairing this digest with an EC key.
    pub fn ecdsa_signature_oid(&self) -> ConstOid {
        match self {
            Self::Sha256 => OID_ECDSA_WITH_SHA256,
            Self::Sha384 => OID_ECDSA_WITH_SHA384,
            Self::Sha512 => OID_ECDSA_WITH_SHA512,
        }
    }

    /// The lowercase name of this digest.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Digest a byte slice in one call.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut h = self.hasher();
        h.update(data);
        h.finish()
    }

    /// Start a streaming hash computation.
    pub fn hasher(&self) -> Hasher {
        match self {
            Self::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            Self::Sha384 => Hasher::Sha384(sha2::Sha384::new()),
            Self::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Streaming hash state for a [`DigestAlgorithm`].
pub enum Hasher {
    /// SHA-256 state.
    Sha256(sha2::Sha256),
    /// SHA-384 state.
    Sha384(sha2::Sha384),
    /// SHA-512 state.
    Sha512(sha2::Sha512),
}

impl Hasher {
    /// Feed more data into the hash.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    /// Finish the computation and return the digest bytes.
    pub fn finish(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha384(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// Encode a dotted-decimal OID string (e.g. a TSA `reqPolicy`) into a
/// [`bcder::Oid`].
pub fn oid_from_dotted(dotted: &str) -> Result<Oid<Bytes>> {
    let arcs = dotted
        .split('.')
        .map(|p| p.parse::<u32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::UnsupportedAlgorithm(format!("OID {dotted}")))?;

    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] > 39) {
        return Err(Error::UnsupportedAlgorithm(format!("OID {dotted}")));
    }

    let mut out = Vec::new();
    push_base128(&mut out, arcs[0] * 40 + arcs[1]);
    for arc in &arcs[2..] {
        push_base128(&mut out, *arc);
    }

    Ok(Oid(Bytes::from(out)))
}

fn push_base128(out: &mut Vec<u8>, mut value: u32) {
    let mut stack = [0u8; 5];
    let mut n = 0;
    loop {
        stack[n] = (value & 0x7f) as u8;
        value >>= 7;
        n += 1;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let cont = if i == 0 { 0 } else { 0x80 };
        out.push(stack[i] | cont);
    }
}
