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

use bcder::{decode::Constructed, Mode};
use rsa::pkcs1::EncodeRsaPublicKey;

use crate::{
    asn1::{
        rfc5652::{ContentInfo, SignedData, SigningCertificateV2},
        split_der_values,
    },
    cms::CadesSignatureBuilder,
    oids::{
        DigestAlgorithm, OID_CONTENT_TYPE, OID_ID_SIGNED_DATA, OID_MESSAGE_DIGEST,
        OID_SIGNATURE_TIME_STAMP, OID_SIGNING_CERTIFICATE_V2,
    },
    raw_signature::SigningAlg,
    tests::test_utils::{make_test_cert, TestCertOptions, TestKey},
    x509::SignerCertificate,
};

fn rsa_test_cert() -> (SignerCertificate, Vec<u8>) {
    let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let pkcs1 = key.to_public_key().to_pkcs1_der().unwrap().into_vec();
    let der = make_test_cert(&TestCertOptions {
        cn: "CMS Unit",
        key: TestKey::Rsa(pkcs1),
        key_usage: Some(0x80),
        eku: None,
    });
    (SignerCertificate::parse(&der).unwrap(), der)
}

fn parse_content_info(der: &[u8]) -> SignedData {
    let ci = Constructed::decode(der, Mode::Der, ContentInfo::take_from).unwrap();
    assert_eq!(ci.content_type, OID_ID_SIGNED_DATA);
    ci.content.unwrap().decode(SignedData::take_from).unwrap()
}

#[test]
fn to_be_signed_is_a_sorted_set() {
    let (cert, _) = rsa_test_cert();
    let digest = DigestAlgorithm::Sha256.digest(b"content");
    let builder = CadesSignatureBuilder::new(
        &cert,
        Vec::new(),
        DigestAlgorithm::Sha256,
        SigningAlg::Rs256,
        &digest,
    )
    .unwrap();

    let tbs = builder.to_be_signed();
    assert_eq!(tbs[0], 0x31, "signing form must be SET OF, not [0]");

    let attrs = split_der_values(crate::asn1::der_content(&tbs).unwrap()).unwrap();
    assert_eq!(attrs.len(), 3);
    let mut sorted = attrs.clone();
    sorted.sort();
    assert_eq!(attrs, sorted, "attributes must be DER-sorted");
}

#[test]
fn signed_data_has_the_expected_shape() {
    let (cert, leaf_der) = rsa_test_cert();
    let digest = DigestAlgorithm::Sha256.digest(b"content");
    let builder = CadesSignatureBuilder::new(
        &cert,
        Vec::new(),
        DigestAlgorithm::Sha256,
        SigningAlg::Rs256,
        &digest,
    )
    .unwrap();

    let cms = builder.build(&[0xab; 256], None).unwrap();
    let sd = parse_content_info(&cms);

    assert_eq!(sd.version, 1);
    assert_eq!(sd.digest_algorithms.len(), 1);
    assert_eq!(
        sd.digest_algorithms[0].algorithm,
        DigestAlgorithm::Sha256.oid()
    );
    assert_eq!(sd.content_info.content_type, crate::oids::OID_ID_DATA);
    assert!(sd.content_info.content.is_none(), "detached signature");

    let certs = sd.certificate_ders().unwrap();
    assert_eq!(certs.len(), 1);
    assert_eq!(certs[0], leaf_der);

    assert_eq!(sd.signer_infos.len(), 1);
    let si = &sd.signer_infos[0];
    assert_eq!(si.version, 1);
    assert!(si.unsigned_attributes.is_none());

    let md = si.signed_attribute(OID_MESSAGE_DIGEST).unwrap();
    assert_eq!(md.values.len(), 1);
    assert_eq!(crate::asn1::der_content(&md.values[0]).unwrap(), digest);

    assert!(si.signed_attribute(OID_CONTENT_TYPE).is_some());
    assert!(si.signed_attribute(OID_SIGNING_CERTIFICATE_V2).is_some());
}

#[test]
fn chain_certificates_follow_the_leaf() {
    let (cert, leaf_der) = rsa_test_cert();
    let (_, other_der) = rsa_test_cert();
    let digest = DigestAlgorithm::Sha256.digest(b"content");
    let builder = CadesSignatureBuilder::new(
        &cert,
        vec![other_der.clone()],
        DigestAlgorithm::Sha256,
        SigningAlg::Rs256,
        &digest,
    )
    .unwrap();

    let cms = builder.build(&[0xab; 256], None).unwrap();
    let certs = parse_content_info(&cms).certificate_ders().unwrap();
    assert_eq!(certs, vec![leaf_der, other_der]);
}

#[test]
fn ess_cert_id_omits_sha256_but_names_sha384() {
    let (cert, leaf_der) = rsa_test_cert();
    let digest = DigestAlgorithm::Sha256.digest(b"content");

    for (alg, digest_alg, explicit) in [
        (SigningAlg::Rs256, DigestAlgorithm::Sha256, false),
        (SigningAlg::Rs384, DigestAlgorithm::Sha384, true),
    ] {
        let builder =
            CadesSignatureBuilder::new(&cert, Vec::new(), digest_alg, alg, &digest).unwrap();
        let cms = builder.build(&[0xab; 256], None).unwrap();
        let sd = parse_content_info(&cms);
        let attr = sd.signer_infos[0]
            .signed_attribute(OID_SIGNING_CERTIFICATE_V2)
            .unwrap();

        let scv2 = Constructed::decode(
            attr.values[0].as_slice(),
            Mode::Der,
            SigningCertificateV2::take_from,
        )
        .unwrap();
        assert_eq!(scv2.certs.len(), 1);
        let id = &scv2.certs[0];

        assert_eq!(id.hash_algorithm.is_some(), explicit);
        assert_eq!(id.cert_hash, digest_alg.digest(&leaf_der));
        assert!(id.issuer_serial.is_some());
    }
}

#[test]
fn timestamp_token_lands_in_unsigned_attributes() {
    let (cert, _) = rsa_test_cert();
    let digest = DigestAlgorithm::Sha256.digest(b"content");
    let builder = CadesSignatureBuilder::new(
        &cert,
        Vec::new(),
        DigestAlgorithm::Sha256,
        SigningAlg::Rs256,
        &digest,
    )
    .unwrap();

    // Any DER value works as a stand-in token here.
    let token = crate::asn1::wrap_der(0x30, &[0x02, 0x01, 0x2a]);
    let cms = builder.build(&[0xab; 256], Some(&token)).unwrap();
    let sd = parse_content_info(&cms);

    let attr = sd.signer_infos[0]
        .unsigned_attribute(OID_SIGNATURE_TIME_STAMP)
        .unwrap();
    assert_eq!(attr.values.len(), 1);
    assert_eq!(attr.values[0], token);
}

#[test]
fn signature_verifies_over_the_set_of_form() {
    use rsa::signature::Verifier;

    let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let pkcs1 = key.to_public_key().to_pkcs1_der().unwrap().into_vec();
    let der = make_test_cert(&TestCertOptions {
        cn: "CMS Verify",
        key: TestKey::Rsa(pkcs1),
        key_usage: Some(0x80),
        eku: None,
    });
    let cert = SignerCertificate::parse(&der).unwrap();

    let digest = DigestAlgorithm::Sha256.digest(b"content");
    let builder = CadesSignatureBuilder::new(
        &cert,
        Vec::new(),
        DigestAlgorithm::Sha256,
        SigningAlg::Rs256,
        &digest,
    )
    .unwrap();

    let signer =
        crate::raw_signature::signer_from_key_pem(key_pem(&key).as_bytes(), SigningAlg::Rs256)
            .unwrap();
    let signature = signer.sign(&builder.to_be_signed()).unwrap();

    let cms = builder.build(&signature, None).unwrap();
    let sd = parse_content_info(&cms);
    let si = &sd.signer_infos[0];

    let verifying = rsa::pkcs1v15::VerifyingKey::<rsa::sha2::Sha256>::new(key.to_public_key());
    let sig = rsa::pkcs1v15::Signature::try_from(si.signature.to_bytes().as_ref()).unwrap();
    verifying
        .verify(&si.signed_attributes_der().unwrap(), &sig)
        .unwrap();
}

fn key_pem(key: &rsa::RsaPrivateKey) -> String {
    use rsa::pkcs8::EncodePrivateKey;
    key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
        .unwrap()
        .to_string()
}
