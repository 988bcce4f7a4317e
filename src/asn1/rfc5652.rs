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

//! ASN.1 types defined by [RFC 5652] (CMS), plus the ESS certificate
//! identifiers of [RFC 5035] that ride inside signed attributes.
//!
//! Encoding of a complete `SignedData` is owned by [`crate::cms`]; this
//! module carries the structural decoders and the `ContentInfo` encoder.
//!
//! [RFC 5652]: https://datatracker.ietf.org/doc/html/rfc5652
//! [RFC 5035]: https://datatracker.ietf.org/doc/html/rfc5035

use bcder::{
    decode::{Constructed, DecodeError, Source},
    encode::{self, PrimitiveContent, Values},
    Captured, Integer, OctetString, Oid, Tag,
};

use crate::asn1::{split_der_values, wrap_der, AlgorithmIdentifier};

/// Content info.
///
/// ```ASN.1
/// ContentInfo ::= SEQUENCE {
///     contentType  ContentType,
///     content      [0] EXPLICIT ANY DEFINED BY contentType }
/// ```
#[derive(Clone, Debug)]
pub struct ContentInfo {
    /// The type of the carried content.
    pub content_type: Oid,

    /// The content value, kept as its captured encoding.
    pub content: Option<Captured>,
}

impl PartialEq for ContentInfo {
    fn eq(&self, other: &Self) -> bool {
        self.content_type == other.content_type
            && self.content.as_ref().map(Captured::as_slice)
                == other.content.as_ref().map(Captured::as_slice)
    }
}

impl Eq for ContentInfo {}

impl ContentInfo {
    /// Parse one content info from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let content_type = Oid::take_from(cons)?;
            let content = cons.take_opt_constructed_if(Tag::CTX_0, |cons| cons.capture_all())?;

            Ok(Self {
                content_type,
                content,
            })
        })
    }

    /// Parse an optional content info from a constructed value.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let content_type = Oid::take_from(cons)?;
            let content = cons.take_opt_constructed_if(Tag::CTX_0, |cons| cons.capture_all())?;

            Ok(Self {
                content_type,
                content,
            })
        })
    }

    /// Encode this content info as DER values.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.content_type.encode_ref(),
            self.content
                .as_ref()
                .map(|content| encode::sequence_as(Tag::CTX_0, content)),
        ))
    }
}

/// Signed data.
///
/// ```ASN.1
/// SignedData ::= SEQUENCE {
///     version           CMSVersion,
///     digestAlgorithms  DigestAlgorithmIdentifiers,
///     encapContentInfo  EncapsulatedContentInfo,
///     certificates      [0] IMPLICIT CertificateSet OPTIONAL,
///     crls              [1] IMPLICIT RevocationInfoChoices OPTIONAL,
///     signerInfos       SignerInfos }
/// ```
#[derive(Clone, Debug)]
pub struct SignedData {
    /// The CMS structure version.
    pub version: i8,

    /// The set of digest algorithms used by the signers.
    pub digest_algorithms: Vec<AlgorithmIdentifier>,

    /// The encapsulated (possibly detached) content.
    pub content_info: EncapsulatedContentInfo,

    /// Raw concatenation of the CertificateSet members, if present.
    pub certificates: Option<Captured>,

    /// The signer infos.
    pub signer_infos: Vec<SignerInfo>,
}

impl SignedData {
    /// Parse one signed data value from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = cons.take_primitive_if(Tag::INTEGER, Integer::i8_from_primitive)?;

            let digest_algorithms = cons.take_set(|cons| {
                let mut algs = Vec::new();
                while let Some(alg) = AlgorithmIdentifier::take_opt_from(cons)? {
                    algs.push(alg);
                }
                Ok(algs)
            })?;

            let content_info = EncapsulatedContentInfo::take_from(cons)?;
            let certificates =
                cons.take_opt_constructed_if(Tag::CTX_0, |cons| cons.capture_all())?;
            let _crls = cons.take_opt_constructed_if(Tag::CTX_1, |cons| cons.capture_all())?;

            let signer_infos = cons.take_set(|cons| {
                let mut infos = Vec::new();
                while let Some(info) = SignerInfo::take_opt_from(cons)? {
                    infos.push(info);
                }
                Ok(infos)
            })?;

            Ok(Self {
                version,
                digest_algorithms,
                content_info,
                certificates,
                signer_infos,
            })
        })
    }

    /// The individual DER encodings of the carried certificates.
    pub fn certificate_ders(&self) -> Result<Vec<Vec<u8>>, &'static str> {
        match &self.certificates {
            Some(captured) => split_der_values(captured.as_slice()),
            None => Ok(Vec::new()),
        }
    }
}

/// Encapsulated content info.
///
/// ```ASN.1
/// EncapsulatedContentInfo ::= SEQUENCE {
///     eContentType  ContentType,
///     eContent      [0] EXPLICIT OCTET STRING OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct EncapsulatedContentInfo {
    /// The type of the encapsulated content.
    pub content_type: Oid,

    /// The content; absent for detached signatures.
    pub content: Option<OctetString>,
}

impl EncapsulatedContentInfo {
    /// Parse one encapsulated content info from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let content_type = Oid::take_from(cons)?;
            let content =
                cons.take_opt_constructed_if(Tag::CTX_0, |cons| OctetString::take_from(cons))?;

            Ok(Self {
                content_type,
                content,
            })
        })
    }
}

/// Signer identifier.
///
/// ```ASN.1
/// SignerIdentifier ::= CHOICE {
///     issuerAndSerialNumber  IssuerAndSerialNumber,
///     subjectKeyIdentifier   [0] SubjectKeyIdentifier }
/// ```
#[derive(Clone, Debug)]
pub enum SignerIdentifier {
    /// Issuer name (captured DER) and certificate serial number.
    IssuerAndSerialNumber {
        /// Captured DER of the issuer `Name`.
        issuer: Captured,
        /// The certificate serial number.
        serial_number: Integer,
    },

    /// Subject key identifier bytes.
    SubjectKeyIdentifier(Vec<u8>),
}

impl SignerIdentifier {
    fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        if let Some(sid) = cons.take_opt_sequence(|cons| {
            let issuer = cons.capture_one()?;
            let serial_number = Integer::take_from(cons)?;
            Ok(Self::IssuerAndSerialNumber {
                issuer,
                serial_number,
            })
        })? {
            return Ok(sid);
        }

        cons.take_primitive_if(Tag::CTX_0, |prim| {
            let bytes = prim.take_all()?;
            Ok(Self::SubjectKeyIdentifier(bytes.to_vec()))
        })
    }
}

/// Signer info.
///
/// ```ASN.1
/// SignerInfo ::= SEQUENCE {
///     version             CMSVersion,
///     sid                 SignerIdentifier,
///     digestAlgorithm     DigestAlgorithmIdentifier,
///     signedAttrs         [0] IMPLICIT SignedAttributes OPTIONAL,
///     signatureAlgorithm  SignatureAlgorithmIdentifier,
///     signature           SignatureValue,
///     unsignedAttrs       [1] IMPLICIT UnsignedAttributes OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct SignerInfo {
    /// The structure version.
    pub version: i8,

    /// The signer identifier.
    pub sid: SignerIdentifier,

    /// Digest algorithm used by this signer.
    pub digest_algorithm: AlgorithmIdentifier,

    /// Parsed signed attributes, if present.
    pub signed_attributes: Option<Vec<Attribute>>,

    /// Captured contents of the signed-attributes set, if present.
    pub signed_attributes_raw: Option<Captured>,

    /// Signature algorithm used by this signer.
    pub signature_algorithm: AlgorithmIdentifier,

    /// The signature value.
    pub signature: OctetString,

    /// Parsed unsigned attributes, if present.
    pub unsigned_attributes: Option<Vec<Attribute>>,
}

impl SignerInfo {
    /// Parse an optional signer info from a constructed value.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let version = cons.take_primitive_if(Tag::INTEGER, Integer::i8_from_primitive)?;
            let sid = SignerIdentifier::take_from(cons)?;
            let digest_algorithm = AlgorithmIdentifier::take_from(cons)?;

            let signed_attributes_raw =
                cons.take_opt_constructed_if(Tag::CTX_0, |cons| cons.capture_all())?;
            let signed_attributes = match &signed_attributes_raw {
                Some(raw) => Some(
                    raw.clone()
                        .decode(Attribute::take_all_from)
                        .map_err(|_| cons.content_err("invalid signed attributes"))?,
                ),
                None => None,
            };

            let signature_algorithm = AlgorithmIdentifier::take_from(cons)?;
            let signature = OctetString::take_from(cons)?;

            let unsigned_raw =
                cons.take_opt_constructed_if(Tag::CTX_1, |cons| cons.capture_all())?;
            let unsigned_attributes = match &unsigned_raw {
                Some(raw) => Some(
                    raw.clone()
                        .decode(Attribute::take_all_from)
                        .map_err(|_| cons.content_err("invalid unsigned attributes"))?,
                ),
                None => None,
            };

            Ok(Self {
                version,
                sid,
                digest_algorithm,
                signed_attributes,
                signed_attributes_raw,
                signature_algorithm,
                signature,
                unsigned_attributes,
            })
        })
    }

    /// The DER `SET OF Attribute` form of the signed attributes — the exact
    /// bytes a verifier hashes and checks the signature over.
    pub fn signed_attributes_der(&self) -> Option<Vec<u8>> {
        self.signed_attributes_raw
            .as_ref()
            .map(|raw| wrap_der(0x31, raw.as_slice()))
    }

    /// Find a signed attribute by type.
    pub fn signed_attribute(&self, typ: bcder::ConstOid) -> Option<&Attribute> {
        self.signed_attributes
            .as_ref()?
            .iter()
            .find(|attr| attr.typ == typ)
    }

    /// Find an unsigned attribute by type.
    pub fn unsigned_attribute(&self, typ: bcder::ConstOid) -> Option<&Attribute> {
        self.unsigned_attributes
            .as_ref()?
            .iter()
            .find(|attr| attr.typ == typ)
    }
}

/// A CMS attribute.
///
/// ```ASN.1
/// Attribute ::= SEQUENCE {
///     attrType    OBJECT IDENTIFIER,
///     attrValues  SET OF AttributeValue }
/// ```
#[derive(Clone, Debug)]
pub struct Attribute {
    /// The attribute type.
    pub typ: Oid,

    /// The attribute values as raw DER encodings.
    pub values: Vec<Vec<u8>>,
}

impl Attribute {
    /// Parse attributes until the enclosing value is exhausted.
    pub fn take_all_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Vec<Self>, DecodeError<S::Error>> {
        let mut attrs = Vec::new();
        while let Some(attr) = Self::take_opt_from(cons)? {
            attrs.push(attr);
        }
        Ok(attrs)
    }

    /// Parse one optional attribute from a constructed value.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let typ = Oid::take_from(cons)?;
            let raw = cons.take_set(|cons| cons.capture_all())?;
            let values =
                split_der_values(raw.as_slice()).map_err(|e| cons.content_err(e))?;

            Ok(Self { typ, values })
        })
    }
}

/// ESS certificate identifier, version 2.
///
/// ```ASN.1
/// ESSCertIDv2 ::= SEQUENCE {
///     hashAlgorithm  AlgorithmIdentifier DEFAULT {algorithm id-sha256},
///     certHash       OCTET STRING,
///     issuerSerial   IssuerSerial OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct EssCertIdV2 {
    /// The declared hash algorithm; absent means SHA-256.
    pub hash_algorithm: Option<AlgorithmIdentifier>,

    /// Hash of the complete certificate DER.
    pub cert_hash: Vec<u8>,

    /// Captured issuerSerial value, if present.
    pub issuer_serial: Option<Captured>,
}

impl EssCertIdV2 {
    /// Parse an optional identifier from a constructed value.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let hash_algorithm = AlgorithmIdentifier::take_opt_from(cons)?;
            let cert_hash = OctetString::take_from(cons)?.to_bytes().to_vec();
            let issuer_serial = cons.take_opt_sequence(|cons| cons.capture_all())?;

            Ok(Self {
                hash_algorithm,
                cert_hash,
                issuer_serial,
            })
        })
    }
}

/// The signing-certificate-v2 attribute value.
///
/// ```ASN.1
/// SigningCertificateV2 ::= SEQUENCE {
///     certs     SEQUENCE OF ESSCertIDv2,
///     policies  SEQUENCE OF PolicyInformation OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct SigningCertificateV2 {
    /// The identified certificates; the first entry is the signer's.
    pub certs: Vec<EssCertIdV2>,
}

impl SigningCertificateV2 {
    /// Parse one value from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let certs = cons.take_sequence(|cons| {
                let mut certs = Vec::new();
                while let Some(cert) = EssCertIdV2::take_opt_from(cons)? {
                    certs.push(cert);
                }
                Ok(certs)
            })?;

            // Policies are not used by this crate; drop them.
            let _policies = cons.capture_all()?;

            Ok(Self { certs })
        })
    }
}
