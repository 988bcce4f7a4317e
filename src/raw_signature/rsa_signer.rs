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

use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs1v15::SigningKey,
    pkcs8::DecodePrivateKey,
    sha2::{Sha256, Sha384, Sha512},
    signature::{SignatureEncoding, Signer},
    traits::PublicKeyParts,
    RsaPrivateKey,
};

use crate::raw_signature::{RawSigner, RawSignerError, SigningAlg};

/// Implements [`RawSigner`] using the `rsa` crate's RSASSA-PKCS1-v1_5
/// implementation.
pub(crate) struct RsaSigner {
    alg: SigningAlg,
    private_key: RsaPrivateKey,
}

impl RsaSigner {
    pub(crate) fn from_key_pem(key_pem: &[u8], alg: SigningAlg) -> Result<Self, RawSignerError> {
        if !alg.is_rsa() {
            return Err(RawSignerError::InternalError(
                "RsaSigner should be used only for SigningAlg::Rs***".to_string(),
            ));
        }

        let pem_str = std::str::from_utf8(key_pem)
            .map_err(|e| RawSignerError::InvalidSigningCredentials(e.to_string()))?;

        let private_key = if pem_str.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem_str)
                .map_err(|e| RawSignerError::InvalidSigningCredentials(e.to_string()))?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem_str)
                .map_err(|e| RawSignerError::InvalidSigningCredentials(e.to_string()))?
        };

        Ok(Self { alg, private_key })
    }
}

impl RawSigner for RsaSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, RawSignerError> {
        let sig = match self.alg {
            SigningAlg::Rs256 => {
                let s = SigningKey::<Sha256>::new(self.private_key.clone());
                s.sign(data).to_bytes()
            }
            SigningAlg::Rs384 => {
                let s = SigningKey::<Sha384>::new(self.private_key.clone());
                s.sign(data).to_bytes()
            }
            SigningAlg::Rs512 => {
                let s = SigningKey::<Sha512>::new(self.private_key.clone());
                s.sign(data).to_bytes()
            }
            _ => {
                return Err(RawSignerError::InternalError(
                    "non-RSA algorithm in RsaSigner".to_string(),
                ));
            }
        };

        Ok(sig.to_vec())
    }

    fn alg(&self) -> SigningAlg {
        self.alg
    }

    fn reserve_size(&self) -> usize {
        self.private_key.size()
    }
}
