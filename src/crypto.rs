pub const AES_BLOCK_SIZE: usize = 16;
pub const HMAC_KEY_MAX_SIZE: usize = 64;
pub const ECDSA_PRIVATE_KEY_SIZE: usize = 32;
/// Uncompressed SEC1 point: `0x04 ‖ x ‖ y`.
pub const ECDSA_PUBLIC_KEY_SIZE: usize = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    InvalidKey,
    SigningFailed,
    VerificationFailed,
    /// Input violates a primitive's length rule (e.g. not a block multiple).
    BadInputLength,
    /// The caller-provided output buffer cannot hold the result.
    BufferTooSmall,
    RngFailed,
    /// The backend does not implement this operation.
    Unsupported,
}

/// Key material for HMAC-SHA256, tagged with a caller-chosen id.
///
/// Keys are opaque byte holders; the backend interprets them and only
/// borrows them for the duration of a single call.
#[derive(Copy, Clone)]
pub struct HmacKey {
    key_id: u32,
    bytes: [u8; HMAC_KEY_MAX_SIZE],
    len: usize,
}

impl HmacKey {
    pub fn new(key_id: u32, bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.is_empty() || bytes.len() > HMAC_KEY_MAX_SIZE {
            return Err(CryptoError::InvalidKey);
        }
        let mut key = Self {
            key_id,
            bytes: [0; HMAC_KEY_MAX_SIZE],
            len: bytes.len(),
        };
        key.bytes[..bytes.len()].copy_from_slice(bytes);
        Ok(key)
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

#[derive(Copy, Clone)]
pub struct AesKey {
    key_id: u32,
    bytes: [u8; AES_BLOCK_SIZE],
}

impl AesKey {
    pub fn new(key_id: u32, bytes: [u8; AES_BLOCK_SIZE]) -> Self {
        Self { key_id, bytes }
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn bytes(&self) -> &[u8; AES_BLOCK_SIZE] {
        &self.bytes
    }
}

#[derive(Copy, Clone)]
pub struct EcdsaPrivateKey {
    key_id: u32,
    scalar: [u8; ECDSA_PRIVATE_KEY_SIZE],
}

impl EcdsaPrivateKey {
    pub fn new(key_id: u32, scalar: [u8; ECDSA_PRIVATE_KEY_SIZE]) -> Self {
        Self { key_id, scalar }
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn scalar(&self) -> &[u8; ECDSA_PRIVATE_KEY_SIZE] {
        &self.scalar
    }
}

#[derive(Copy, Clone)]
pub struct EcdsaPublicKey {
    key_id: u32,
    point: [u8; ECDSA_PUBLIC_KEY_SIZE],
}

impl EcdsaPublicKey {
    pub fn new(key_id: u32, point: &[u8]) -> Result<Self, CryptoError> {
        if point.len() != ECDSA_PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKey);
        }
        let mut key = Self {
            key_id,
            point: [0; ECDSA_PUBLIC_KEY_SIZE],
        };
        key.point.copy_from_slice(point);
        Ok(key)
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn point(&self) -> &[u8; ECDSA_PUBLIC_KEY_SIZE] {
        &self.point
    }
}

/// The cryptographic capabilities the packet engine is built against.
///
/// Implementations can be swapped (hardware offload, software, stubs in
/// tests) without touching any caller. Operations a backend cannot perform
/// report `CryptoError::Unsupported`.
pub trait CryptoBackend {
    fn sha256(&mut self, input: &[u8], out: &mut [u8; 32]);

    fn hmac_sha256(
        &mut self,
        key: &HmacKey,
        input: &[u8],
        out: &mut [u8; 32],
    ) -> Result<(), CryptoError>;

    /// Signs `input` with ECDSA P-256 over SHA-256, writing the DER-encoded
    /// signature into `sig_out` and returning its actual length.
    fn ecdsa_sign(
        &mut self,
        key: &EcdsaPrivateKey,
        input: &[u8],
        sig_out: &mut [u8],
    ) -> Result<usize, CryptoError>;

    /// Verifies a DER-encoded ECDSA P-256 signature.
    fn ecdsa_verify(
        &mut self,
        key: &EcdsaPublicKey,
        input: &[u8],
        sig: &[u8],
    ) -> Result<(), CryptoError>;

    /// AES-128-CBC without padding: `input` must be a block multiple.
    /// Returns the ciphertext length written to `out`.
    fn aes_cbc_encrypt(
        &mut self,
        key: &AesKey,
        iv: &[u8; AES_BLOCK_SIZE],
        input: &[u8],
        out: &mut [u8],
    ) -> Result<usize, CryptoError>;

    fn aes_cbc_decrypt(
        &mut self,
        key: &AesKey,
        iv: &[u8; AES_BLOCK_SIZE],
        input: &[u8],
        out: &mut [u8],
    ) -> Result<usize, CryptoError>;

    fn fill_random(&mut self, dest: &mut [u8]) -> Result<(), CryptoError>;

    /// Draws a fresh random HMAC key from the backend's RNG.
    fn make_hmac_key(&mut self, key_id: u32) -> Result<HmacKey, CryptoError> {
        let mut bytes = [0u8; 32];
        self.fill_random(&mut bytes)?;
        HmacKey::new(key_id, &bytes)
    }

    /// HKDF-SHA256 (RFC 5869) extract-then-expand.
    fn hkdf_sha256(
        &mut self,
        _salt: &[u8],
        _ikm: &[u8],
        _info: &[u8],
        _okm: &mut [u8],
    ) -> Result<(), CryptoError> {
        Err(CryptoError::Unsupported)
    }

    /// Deterministic HMAC-based pseudo-random expansion of a seed.
    fn hmac_prng(
        &mut self,
        _seed: &[u8],
        _personalization: &[u8],
        _out: &mut [u8],
    ) -> Result<(), CryptoError> {
        Err(CryptoError::Unsupported)
    }
}

#[cfg(feature = "software-crypto")]
pub mod software {
    use super::*;

    use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
    use hmac::{Hmac, Mac};
    use p256::ecdsa::signature::{RandomizedSigner, Verifier};
    use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
    use rand_core::{CryptoRng, RngCore};
    use sha2::{Digest, Sha256};

    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
    type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
    type HmacSha256 = Hmac<Sha256>;

    /// Pure-software backend over the RustCrypto crates. The RNG is owned
    /// so ECDSA signing can be randomized; pass a seeded RNG for
    /// reproducible tests.
    pub struct SoftwareCrypto<R: RngCore + CryptoRng> {
        rng: R,
    }

    impl<R: RngCore + CryptoRng> SoftwareCrypto<R> {
        pub fn new(rng: R) -> Self {
            Self { rng }
        }

        fn hmac(key: &HmacKey) -> Result<HmacSha256, CryptoError> {
            HmacSha256::new_from_slice(key.bytes()).map_err(|_| CryptoError::InvalidKey)
        }
    }

    impl<R: RngCore + CryptoRng> CryptoBackend for SoftwareCrypto<R> {
        fn sha256(&mut self, input: &[u8], out: &mut [u8; 32]) {
            let mut hasher = Sha256::new();
            hasher.update(input);
            out.copy_from_slice(&hasher.finalize());
        }

        fn hmac_sha256(
            &mut self,
            key: &HmacKey,
            input: &[u8],
            out: &mut [u8; 32],
        ) -> Result<(), CryptoError> {
            let mut mac = Self::hmac(key)?;
            mac.update(input);
            out.copy_from_slice(&mac.finalize().into_bytes());
            Ok(())
        }

        fn ecdsa_sign(
            &mut self,
            key: &EcdsaPrivateKey,
            input: &[u8],
            sig_out: &mut [u8],
        ) -> Result<usize, CryptoError> {
            let signing_key =
                SigningKey::from_slice(key.scalar()).map_err(|_| CryptoError::InvalidKey)?;
            let signature: EcdsaSignature = signing_key
                .try_sign_with_rng(&mut self.rng, input)
                .map_err(|_| CryptoError::SigningFailed)?;
            let der = signature.to_der();
            let der = der.as_bytes();
            if der.len() > sig_out.len() {
                return Err(CryptoError::BufferTooSmall);
            }
            sig_out[..der.len()].copy_from_slice(der);
            Ok(der.len())
        }

        fn ecdsa_verify(
            &mut self,
            key: &EcdsaPublicKey,
            input: &[u8],
            sig: &[u8],
        ) -> Result<(), CryptoError> {
            let verifying_key =
                VerifyingKey::from_sec1_bytes(key.point()).map_err(|_| CryptoError::InvalidKey)?;
            let signature =
                EcdsaSignature::from_der(sig).map_err(|_| CryptoError::VerificationFailed)?;
            verifying_key
                .verify(input, &signature)
                .map_err(|_| CryptoError::VerificationFailed)
        }

        fn aes_cbc_encrypt(
            &mut self,
            key: &AesKey,
            iv: &[u8; AES_BLOCK_SIZE],
            input: &[u8],
            out: &mut [u8],
        ) -> Result<usize, CryptoError> {
            if input.len() % AES_BLOCK_SIZE != 0 {
                return Err(CryptoError::BadInputLength);
            }
            let ciphertext = Aes128CbcEnc::new(key.bytes().into(), iv.into())
                .encrypt_padded_b2b_mut::<NoPadding>(input, out)
                .map_err(|_| CryptoError::BufferTooSmall)?;
            Ok(ciphertext.len())
        }

        fn aes_cbc_decrypt(
            &mut self,
            key: &AesKey,
            iv: &[u8; AES_BLOCK_SIZE],
            input: &[u8],
            out: &mut [u8],
        ) -> Result<usize, CryptoError> {
            if input.len() % AES_BLOCK_SIZE != 0 {
                return Err(CryptoError::BadInputLength);
            }
            let plaintext = Aes128CbcDec::new(key.bytes().into(), iv.into())
                .decrypt_padded_b2b_mut::<NoPadding>(input, out)
                .map_err(|_| CryptoError::BufferTooSmall)?;
            Ok(plaintext.len())
        }

        fn fill_random(&mut self, dest: &mut [u8]) -> Result<(), CryptoError> {
            self.rng
                .try_fill_bytes(dest)
                .map_err(|_| CryptoError::RngFailed)
        }

        fn hkdf_sha256(
            &mut self,
            salt: &[u8],
            ikm: &[u8],
            info: &[u8],
            okm: &mut [u8],
        ) -> Result<(), CryptoError> {
            if okm.len() > 255 * 32 {
                return Err(CryptoError::BadInputLength);
            }
            // Extract: PRK = HMAC(salt, ikm), an absent salt is 32 zero bytes.
            let zeros = [0u8; 32];
            let salt = if salt.is_empty() { &zeros[..] } else { salt };
            let mut prk_mac =
                HmacSha256::new_from_slice(salt).map_err(|_| CryptoError::InvalidKey)?;
            prk_mac.update(ikm);
            let prk = prk_mac.finalize().into_bytes();

            // Expand: T(i) = HMAC(PRK, T(i-1) ‖ info ‖ i).
            let mut previous: Option<[u8; 32]> = None;
            let mut counter = 1u8;
            let mut written = 0;
            while written < okm.len() {
                let mut mac =
                    HmacSha256::new_from_slice(&prk).map_err(|_| CryptoError::InvalidKey)?;
                if let Some(previous) = &previous {
                    mac.update(previous);
                }
                mac.update(info);
                mac.update(&[counter]);
                let block: [u8; 32] = mac.finalize().into_bytes().into();

                let take = (okm.len() - written).min(32);
                okm[written..written + take].copy_from_slice(&block[..take]);
                written += take;
                previous = Some(block);
                counter = counter.wrapping_add(1);
            }
            Ok(())
        }

        fn hmac_prng(
            &mut self,
            seed: &[u8],
            personalization: &[u8],
            out: &mut [u8],
        ) -> Result<(), CryptoError> {
            let mut counter = 0u32;
            let mut written = 0;
            while written < out.len() {
                let mut mac =
                    HmacSha256::new_from_slice(seed).map_err(|_| CryptoError::InvalidKey)?;
                mac.update(personalization);
                mac.update(&counter.to_be_bytes());
                let block = mac.finalize().into_bytes();

                let take = (out.len() - written).min(32);
                out[written..written + take].copy_from_slice(&block[..take]);
                written += take;
                counter = counter.wrapping_add(1);
            }
            Ok(())
        }
    }
}
