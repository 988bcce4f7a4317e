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

use thiserror::Error;

use crate::raw_signature::{
    ecdsa_signer::EcdsaSigner, rsa_signer::RsaSigner, SigningAlg,
};

/// Implementations of the `RawSigner` trait generate a cryptographic
/// signature over an arbitrary byte array.
pub trait RawSigner {
    /// Return a raw signature over the original byte slice.
    ///
    /// RSA signers return the PKCS#1 v1.5 block; ECDSA signers return the
    /// ASN.1 DER encoding of `(r, s)`.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, RawSignerError>;

    /// Return the algorithm implemented by this signer.
    fn alg(&self) -> SigningAlg;

    /// Return the size in bytes of the largest possible expected signature.
    fn reserve_size(&self) -> usize;
}

/// Build the signer matching `alg` from a PEM-encoded private key.
///
/// RSA keys are accepted in PKCS#8 (`PRIVATE KEY`) or PKCS#1
/// (`RSA PRIVATE KEY`) form; EC keys in PKCS#8 form.
pub fn signer_from_key_pem(
    key_pem: &[u8],
    alg: SigningAlg,
) -> Result<Box<dyn RawSigner>, RawSignerError> {
    if alg.is_rsa() {
        Ok(Box::new(RsaSigner::from_key_pem(key_pem, alg)?))
    } else {
        Ok(Box::new(EcdsaSigner::from_key_pem(key_pem, alg)?))
    }
}

/// Describes errors that can be identified when generating a raw signature.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum RawSignerError {
    /// The private key material could not be interpreted.
    ///
    /// NOTE: We do not directly capture the underlying error because it
    /// lacks an `Eq` implementation. Instead we capture the error
    /// description.
    #[error("invalid signing credentials ({0})")]
    InvalidSigningCredentials(String),

    /// An I/O error occurred. This typically happens when loading key
    /// material from files.
    ///
    /// NOTE: We do not directly capture the I/O error itself because it
    /// lacks an `Eq` implementation. Instead we capture the error
    /// description.
    #[error("I/O error ({0})")]
    IoError(String),

    /// An unexpected internal error occured while signing.
    #[error("internal error ({0})")]
    InternalError(String),
}

impl From<std::io::Error> for RawSignerError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
