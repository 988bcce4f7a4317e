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

use bcder::{encode, encode::PrimitiveContent, OctetString, Oid};
use bytes::Bytes;

use crate::{
    asn1::{to_der, wrap_der, AlgorithmIdentifier, RawDer, RawInteger},
    oids::{
        DigestAlgorithm, OID_CONTENT_TYPE, OID_ID_DATA, OID_ID_SIGNED_DATA, OID_MESSAGE_DIGEST,
        OID_SIGNATURE_TIME_STAMP, OID_SIGNING_CERTIFICATE_V2,
    },
    raw_signature::SigningAlg,
    x509::SignerCertificate,
    Result,
};

/// Builds a detached CAdES-BES `SignedData` over an externally computed
/// content digest.
///
/// The builder is used in three steps: construct it, feed
/// [`to_be_signed`](Self::to_be_signed) to a raw signer, then assemble the
/// final CMS with [`build`](Self::build), optionally attaching a TSA token
/// as the unsigned signature-time-stamp attribute.
pub struct CadesSignatureBuilder {
    digest: DigestAlgorithm,
    alg: SigningAlg,
    leaf_der: Vec<u8>,
    chain_der: Vec<Vec<u8>>,
    issuer_der: Vec<u8>,
    serial_der: Vec<u8>,
    signed_attrs: Vec<Vec<u8>>,
}

impl CadesSignatureBuilder {
    /// Start a builder for the given signer.
    ///
    /// `message_digest` is the digest of the detached content (for PDF
    /// signatures, the byte-range hash), computed with `digest`. `chain_der`
    /// carries the issuer chain in leaf-first order; the leaf itself comes
    /// from `cert`.
    pub fn new(
        cert: &SignerCertificate,
        chain_der: Vec<Vec<u8>>,
        digest: DigestAlgorithm,
        alg: SigningAlg,
        message_digest: &[u8],
    ) -> Result<Self> {
        let mut signed_attrs = vec![
            attribute(OID_CONTENT_TYPE.0, &to_der(OID_ID_DATA.encode())?)?,
            attribute(
                OID_MESSAGE_DIGEST.0,
                &to_der(OctetString::encode_slice(message_digest))?,
            )?,
            attribute(
                OID_SIGNING_CERTIFICATE_V2.0,
                &signing_certificate_v2(cert, digest)?,
            )?,
        ];

        // DER SET OF: members ordered by their encoded octets.
        signed_attrs.sort();

        Ok(Self {
            digest,
            alg,
            leaf_der: cert.der().to_vec(),
            chain_der,
            issuer_der: cert.issuer_der().to_vec(),
            serial_der: cert.serial_der().to_vec(),
            signed_attrs,
        })
    }

    /// The exact bytes the raw signer must sign: the DER `SET OF Attribute`
    /// form of the signed attributes, not the `[0] IMPLICIT` form that is
    /// transmitted.
    pub fn to_be_signed(&self) -> Vec<u8> {
        wrap_der(0x31, &self.signed_attrs.concat())
    }

    /// Assemble the final `ContentInfo(SignedData)` DER.
    ///
    /// `signature` is the raw signature over [`to_be_signed`](Self::to_be_signed);
    /// `timestamp_token` is a TSA token `ContentInfo` DER to attach as the
    /// unsigned signature-time-stamp attribute.
    pub fn build(&self, signature: &[u8], timestamp_token: Option<&[u8]>) -> Result<Vec<u8>> {
        let signed_attrs_transmitted = wrap_der(0xa0, &self.signed_attrs.concat());

        let unsigned_attrs = match timestamp_token {
            Some(token) => Some(wrap_der(
                0xa1,
                &attribute(OID_SIGNATURE_TIME_STAMP.0, token)?,
            )),
            None => None,
        };

        let digest_alg = AlgorithmIdentifier::new(oid(self.digest.oid().0));
        let signature_alg = if self.alg.is_rsa() {
            AlgorithmIdentifier::new_with_null(oid(self.alg.signature_oid().0))
        } else {
            AlgorithmIdentifier::new(oid(self.alg.signature_oid().0))
        };

        let signer_info = to_der(encode::sequence((
            1u8.encode(), // version
            encode::sequence((
                // sid: IssuerAndSerialNumber
                RawDer(&self.issuer_der),
                RawInteger(&self.serial_der).encode(),
            )),
            &digest_alg,
            RawDer(&signed_attrs_transmitted),
            &signature_alg,
            OctetString::encode_slice(signature),
            unsigned_attrs.as_deref().map(RawDer),
        )))?;

        let mut certificates = self.leaf_der.clone();
        for cert in &self.chain_der {
            certificates.extend_from_slice(cert);
        }
        let certificates = wrap_der(0xa0, &certificates);

        let signed_data = to_der(encode::sequence((
            1u8.encode(),                       // version
            encode::set(&digest_alg),           // digestAlgorithms
            encode::sequence(OID_ID_DATA.encode()), // encapContentInfo, eContent absent
            RawDer(&certificates),
            encode::set(RawDer(&signer_info)), // signerInfos
        )))?;

        Ok(to_der(encode::sequence((
            OID_ID_SIGNED_DATA.encode(),
            encode::sequence_as(bcder::Tag::CTX_0, RawDer(&signed_data)),
        )))?)
    }
}

// Attribute ::= SEQUENCE { attrType OBJECT IDENTIFIER, attrValues SET OF ANY }
fn attribute(typ: &'static [u8], value_der: &[u8]) -> Result<Vec<u8>> {
    Ok(to_der(encode::sequence((
        Oid(typ).encode(),
        encode::set(RawDer(value_der)),
    )))?)
}

// SigningCertificateV2 with a single ESSCertIDv2 naming the leaf.
//
// The hashAlgorithm is DEFAULT sha256: it is omitted for SHA-256 and
// emitted explicitly for the larger digests.
fn signing_certificate_v2(cert: &SignerCertificate, digest: DigestAlgorithm) -> Result<Vec<u8>> {
    let cert_hash = digest.digest(cert.der());

    let hash_algorithm = match digest {
        DigestAlgorithm::Sha256 => None,
        _ => Some(AlgorithmIdentifier::new(oid(digest.oid().0))),
    };

    // IssuerSerial ::= SEQUENCE { issuer GeneralNames, serialNumber INTEGER }
    // with the issuer expressed as directoryName ([4] EXPLICIT Name).
    let directory_name = wrap_der(0xa4, cert.issuer_der());
    let issuer_serial = to_der(encode::sequence((
        encode::sequence(RawDer(&directory_name)), // GeneralNames
        RawInteger(cert.serial_der()).encode(),
    )))?;

    let ess_cert_id = to_der(encode::sequence((
        hash_algorithm,
        OctetString::encode_slice(cert_hash.as_slice()),
        RawDer(&issuer_serial),
    )))?;

    Ok(to_der(encode::sequence(encode::sequence(RawDer(
        &ess_cert_id,
    ))))?)
}

fn oid(content: &'static [u8]) -> Oid<Bytes> {
    Oid(Bytes::from_static(content))
}
