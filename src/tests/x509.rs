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

use rsa::pkcs1::EncodeRsaPublicKey;

use crate::{
    oids::{DigestAlgorithm, OID_KP_TIME_STAMPING, OID_PRIME256V1, OID_SECP384R1},
    tests::test_utils::{make_test_cert, test_issuer_name, TestCertOptions, TestKey},
    x509::{PublicKeyKind, SignerCertificate},
};

fn rsa_pkcs1() -> Vec<u8> {
    let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    key.to_public_key().to_pkcs1_der().unwrap().into_vec()
}

fn p256_point() -> Vec<u8> {
    let key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
    key.verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec()
}

#[test]
fn extracts_subject_issuer_and_key_kind() {
    let der = make_test_cert(&TestCertOptions {
        cn: "Unit Signer",
        key: TestKey::Rsa(rsa_pkcs1()),
        key_usage: Some(0x80),
        eku: None,
    });

    let cert = SignerCertificate::parse(&der).unwrap();
    assert_eq!(cert.subject_common_name(), "Unit Signer");
    assert_eq!(cert.issuer_der(), test_issuer_name());
    assert_eq!(cert.serial_der(), &[0x0d, 0xf0, 0x0d]);
    assert_eq!(cert.public_key_kind(), &PublicKeyKind::Rsa);
    assert_eq!(cert.recommended_digest().unwrap(), DigestAlgorithm::Sha256);
}

#[test]
fn ec_keys_recommend_their_curve_digest() {
    let der = make_test_cert(&TestCertOptions {
        cn: "EC Signer",
        key: TestKey::Ec {
            curve: OID_PRIME256V1.0,
            point: p256_point(),
        },
        key_usage: Some(0x80),
        eku: None,
    });

    let cert = SignerCertificate::parse(&der).unwrap();
    match cert.public_key_kind() {
        PublicKeyKind::Ec { curve } => assert_eq!(curve.as_slice(), OID_PRIME256V1.0),
        other => panic!("expected EC key, got {other:?}"),
    }
    assert_eq!(cert.recommended_digest().unwrap(), DigestAlgorithm::Sha256);

    // Same point bytes are fine for the P-384 curve declaration; only the
    // OID matters for the recommendation.
    let der = make_test_cert(&TestCertOptions {
        cn: "EC Signer",
        key: TestKey::Ec {
            curve: OID_SECP384R1.0,
            point: p256_point(),
        },
        key_usage: None,
        eku: None,
    });
    let cert = SignerCertificate::parse(&der).unwrap();
    assert_eq!(cert.recommended_digest().unwrap(), DigestAlgorithm::Sha384);
}

#[test]
fn digital_signature_allows_signing() {
    let der = make_test_cert(&TestCertOptions {
        cn: "Signer",
        key: TestKey::Rsa(rsa_pkcs1()),
        key_usage: Some(0x80),
        eku: None,
    });
    assert!(SignerCertificate::parse(&der).unwrap().can_sign());
}

#[test]
fn content_commitment_alone_allows_signing() {
    let der = make_test_cert(&TestCertOptions {
        cn: "Signer",
        key: TestKey::Rsa(rsa_pkcs1()),
        key_usage: Some(0x40),
        eku: None,
    });
    assert!(SignerCertificate::parse(&der).unwrap().can_sign());
}

#[test]
fn key_agreement_only_blocks_signing() {
    let der = make_test_cert(&TestCertOptions {
        cn: "Exchange",
        key: TestKey::Rsa(rsa_pkcs1()),
        key_usage: Some(0x08),
        eku: None,
    });
    assert!(!SignerCertificate::parse(&der).unwrap().can_sign());
}

#[test]
fn absent_key_usage_allows_signing() {
    let der = make_test_cert(&TestCertOptions {
        cn: "Signer",
        key: TestKey::Rsa(rsa_pkcs1()),
        key_usage: None,
        eku: None,
    });
    assert!(SignerCertificate::parse(&der).unwrap().can_sign());
}

#[test]
fn timestamping_only_eku_blocks_signing() {
    let der = make_test_cert(&TestCertOptions {
        cn: "TSA Unit",
        key: TestKey::Rsa(rsa_pkcs1()),
        key_usage: Some(0x80),
        eku: Some(vec![OID_KP_TIME_STAMPING.0]),
    });
    assert!(!SignerCertificate::parse(&der).unwrap().can_sign());
}

#[test]
fn mixed_eku_allows_signing() {
    // id-kp-emailProtection alongside time stamping.
    const EMAIL_PROTECTION: &[u8] = &[43, 6, 1, 5, 5, 7, 3, 4];
    let der = make_test_cert(&TestCertOptions {
        cn: "Mixed",
        key: TestKey::Rsa(rsa_pkcs1()),
        key_usage: Some(0x80),
        eku: Some(vec![OID_KP_TIME_STAMPING.0, EMAIL_PROTECTION]),
    });
    assert!(SignerCertificate::parse(&der).unwrap().can_sign());
}

#[test]
fn garbage_is_cert_invalid() {
    assert!(matches!(
        SignerCertificate::parse(b"not a certificate"),
        Err(crate::Error::CertInvalid(_))
    ));
}
