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

use std::{fmt, str::FromStr};

use bcder::ConstOid;
use serde::{Deserialize, Serialize};

use crate::{
    oids::DigestAlgorithm,
    x509::PublicKeyKind,
    Error,
};

/// The digital signature algorithms this crate can produce.
///
/// RSA keys sign with RSASSA-PKCS1-v1_5 and EC keys with ECDSA emitting the
/// ASN.1 DER `r‖s` form, which is what a CMS `SignatureValue` carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SigningAlg {
    /// ECDSA with SHA-256 over P-256
    Es256,

    /// ECDSA with SHA-384 over P-384
    Es384,

    /// ECDSA with SHA-512 over P-521
    Es512,

    /// RSASSA-PKCS1-v1_5 with SHA-256
    Rs256,

    /// RSASSA-PKCS1-v1_5 with SHA-384
    Rs384,

    /// RSASSA-PKCS1-v1_5 with SHA-512
    Rs512,
}

impl SigningAlg {
    /// Choose the algorithm matching a certificate's key kind and the
    /// selected digest.
    ///
    /// EC keys must pair with their curve's digest; a mismatch fails with
    /// [`Error::UnsupportedAlgorithm`].
    pub fn from_key_and_digest(key: &PublicKeyKind, digest: DigestAlgorithm) -> crate::Result<Self> {
        match key {
            PublicKeyKind::Rsa => Ok(match digest {
                DigestAlgorithm::Sha256 => Self::Rs256,
                DigestAlgorithm::Sha384 => Self::Rs384,
                DigestAlgorithm::Sha512 => Self::Rs512,
            }),
            PublicKeyKind::Ec { curve } => {
                let wanted = DigestAlgorithm::for_curve(curve)?;
                if wanted != digest {
                    return Err(Error::UnsupportedAlgorithm(format!(
                        "digest {digest} does not match the key's curve (expects {wanted})"
                    )));
                }
                Ok(match digest {
                    DigestAlgorithm::Sha256 => Self::Es256,
                    DigestAlgorithm::Sha384 => Self::Es384,
                    DigestAlgorithm::Sha512 => Self::Es512,
                })
            }
        }
    }

    /// The digest this algorithm hashes with.
    pub fn digest(&self) -> DigestAlgorithm {
        match self {
            Self::Es256 | Self::Rs256 => DigestAlgorithm::Sha256,
            Self::Es384 | Self::Rs384 => DigestAlgorithm::Sha384,
            Self::Es512 | Self::Rs512 => DigestAlgorithm::Sha512,
        }
    }

    /// The CMS `signatureAlgorithm` OID for this algorithm.
    pub fn signature_oid(&self) -> ConstOid {
        match self {
            Self::Es256 | Self::Es384 | Self::Es512 => self.digest().ecdsa_signature_oid(),
            Self::Rs256 | Self::Rs384 | Self::Rs512 => self.digest().rsa_signature_oid(),
        }
    }

    /// Whether this is an RSA algorithm.
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::Rs256 | Self::Rs384 | Self::Rs512)
    }
}

impl FromStr for SigningAlg {
    type Err = UnknownAlgorithmError;

    fn from_str(alg: &str) -> Result<Self, Self::Err> {
        match alg {
            "es256" => Ok(Self::Es256),
            "es384" => Ok(Self::Es384),
            "es512" => Ok(Self::Es512),
            "rs256" => Ok(Self::Rs256),
            "rs384" => Ok(Self::Rs384),
            "rs512" => Ok(Self::Rs512),
            _ => Err(UnknownAlgorithmError(alg.to_owned())),
        }
    }
}

impl fmt::Display for SigningAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Self::Es256 => "es256",
                Self::Es384 => "es384",
                Self::Es512 => "es512",
                Self::Rs256 => "rs256",
                Self::Rs384 => "rs384",
                Self::Rs512 => "rs512",
            }
        )
    }
}

/// This error is thrown when converting from a string to [`SigningAlg`]
/// if the algorithm string is unrecognized.
///
/// The string must be one of "es256", "es384", "es512", "rs256", "rs384",
/// or "rs512".
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownAlgorithmError(pub String);

impl fmt::Display for UnknownAlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "UnknownAlgorithmError({})", self.0)
    }
}

impl std::error::Error for UnknownAlgorithmError {}
