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

use bcder::{decode::Constructed, Integer, Mode, OctetString, Tag};
use ecdsa::signature::Signer;
use p256::ecdsa::{Signature as P256Signature, SigningKey as P256SigningKey};
use p384::ecdsa::{Signature as P384Signature, SigningKey as P384SigningKey};
use p521::ecdsa::{Signature as P521Signature, SigningKey as P521SigningKey};
use pkcs8::{DecodePrivateKey, PrivateKeyInfo};

use crate::raw_signature::{RawSigner, RawSignerError, SigningAlg};

// Signing keys for the three curves are distinct types.
enum EcdsaSigningKey {
    Es256(P256SigningKey),
    Es384(P384SigningKey),
    Es512(P521SigningKey),
}

/// Implements [`RawSigner`] using the RustCrypto ECDSA stack. Signatures
/// are emitted in the ASN.1 DER form a CMS `SignatureValue` expects.
pub(crate) struct EcdsaSigner {
    alg: SigningAlg,
    signing_key: EcdsaSigningKey,
}

impl EcdsaSigner {
    pub(crate) fn from_key_pem(key_pem: &[u8], alg: SigningAlg) -> Result<Self, RawSignerError> {
        let pem_str = std::str::from_utf8(key_pem).map_err(|e| {
            RawSignerError::InvalidSigningCredentials(format!("invalid private key: {e}"))
        })?;

        let signing_key = match alg {
            SigningAlg::Es256 => {
                let key = P256SigningKey::from_pkcs8_pem(pem_str).map_err(|e| {
                    RawSignerError::InvalidSigningCredentials(format!(
                        "invalid ES256 private key: {e}"
                    ))
                })?;
                EcdsaSigningKey::Es256(key)
            }
            SigningAlg::Es384 => {
                let key = P384SigningKey::from_pkcs8_pem(pem_str).map_err(|e| {
                    RawSignerError::InvalidSigningCredentials(format!(
                        "invalid ES384 private key: {e}"
                    ))
                })?;
                EcdsaSigningKey::Es384(key)
            }
            SigningAlg::Es512 => EcdsaSigningKey::Es512(es512_from_pkcs8_pem(pem_str)?),
            _ => {
                return Err(RawSignerError::InvalidSigningCredentials(
                    "Unsupported algorithm".to_string(),
                ))
            }
        };

        Ok(Self { alg, signing_key })
    }
}

impl RawSigner for EcdsaSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, RawSignerError> {
        match &self.signing_key {
            EcdsaSigningKey::Es256(key) => {
                let signature: P256Signature = key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            EcdsaSigningKey::Es384(key) => {
                let signature: P384Signature = key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            EcdsaSigningKey::Es512(key) => {
                let signature: P521Signature = key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }

    fn alg(&self) -> SigningAlg {
        self.alg
    }

    fn reserve_size(&self) -> usize {
        // Two INTEGERs of field size plus DER framing.
        match self.alg {
            SigningAlg::Es256 => 80,
            SigningAlg::Es384 => 112,
            _ => 148,
        }
    }
}

// P-521 keys predate `from_pkcs8_pem` support in the p521 crate, so the
// PKCS#8 envelope and the inner ECPrivateKey are unwrapped by hand.
fn es512_from_pkcs8_pem(pem_str: &str) -> Result<P521SigningKey, RawSignerError> {
    let pem = pem::parse(pem_str).map_err(|e| {
        RawSignerError::InvalidSigningCredentials(format!("invalid ES512 private key PEM: {e}"))
    })?;

    let pk_info = PrivateKeyInfo::try_from(pem.contents()).map_err(|e| {
        RawSignerError::InvalidSigningCredentials(format!("invalid ES512 PKCS#8 structure: {e}"))
    })?;

    // ECPrivateKey ::= SEQUENCE { version INTEGER, privateKey OCTET STRING, ... }
    let scalar = Constructed::decode(pk_info.private_key, Mode::Der, |cons| {
        cons.take_sequence(|cons| {
            let _version = cons.take_primitive_if(Tag::INTEGER, Integer::i8_from_primitive)?;
            let scalar = OctetString::take_from(cons)?;
            let _rest = cons.capture_all()?;
            Ok(scalar)
        })
    })
    .map_err(|e| {
        RawSignerError::InvalidSigningCredentials(format!("invalid ES512 ECPrivateKey: {e}"))
    })?;

    P521SigningKey::from_slice(&scalar.to_bytes()).map_err(|e| {
        RawSignerError::InvalidSigningCredentials(format!("invalid ES512 private key: {e}"))
    })
}
