//! Process-wide key fixtures. Generation is expensive (RSA in
//! particular), so each fixture is built once and shared.

use std::sync::OnceLock;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;

/// A generated RSA keypair with its JWK members precomputed.
pub struct RsaKeyFixture {
    pub private_pem: String,
    pub public_pem: String,
    pub n_b64: String,
    pub e_b64: String,
}

/// Shared 2048-bit RSA fixture.
pub fn rsa_fixture() -> &'static RsaKeyFixture {
    static FIXTURE: OnceLock<RsaKeyFixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)
            .expect("RSA key generation failed");
        let public = private.to_public_key();
        RsaKeyFixture {
            private_pem: private
                .to_pkcs8_pem(LineEnding::LF)
                .expect("PKCS#8 encoding failed")
                .to_string(),
            public_pem: public
                .to_public_key_pem(LineEnding::LF)
                .expect("SPKI encoding failed")
                .trim_end()
                .to_string(),
            n_b64: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            e_b64: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        }
    })
}

/// A generated P-256 keypair with its JWK members precomputed.
pub struct P256KeyFixture {
    pub signing_key: p256::ecdsa::SigningKey,
    pub public_pem: String,
    pub x_b64: String,
    pub y_b64: String,
}

/// Shared P-256 fixture.
pub fn p256_fixture() -> &'static P256KeyFixture {
    static FIXTURE: OnceLock<P256KeyFixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let signing_key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let point = signing_key.verifying_key().to_encoded_point(false);
        P256KeyFixture {
            public_pem: signing_key
                .verifying_key()
                .to_public_key_pem(LineEnding::LF)
                .expect("SPKI encoding failed")
                .trim_end()
                .to_string(),
            x_b64: URL_SAFE_NO_PAD.encode(point.x().expect("x coordinate")),
            y_b64: URL_SAFE_NO_PAD.encode(point.y().expect("y coordinate")),
            signing_key,
        }
    })
}

/// A generated P-521 keypair.
pub struct P521KeyFixture {
    pub signing_key: p521::ecdsa::SigningKey,
    pub public_pem: String,
}

/// Shared P-521 fixture.
pub fn p521_fixture() -> &'static P521KeyFixture {
    static FIXTURE: OnceLock<P521KeyFixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let signing_key = p521::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        // p521's `ecdsa::VerifyingKey` wrapper lacks pkcs8 impls, so
        // go through `PublicKey` for the SPKI PEM.
        let verifying_key = p521::ecdsa::VerifyingKey::from(&signing_key);
        P521KeyFixture {
            public_pem: p521::PublicKey::from_affine(*verifying_key.as_affine())
                .expect("valid public point")
                .to_public_key_pem(LineEnding::LF)
                .expect("SPKI encoding failed")
                .trim_end()
                .to_string(),
            signing_key,
        }
    })
}
