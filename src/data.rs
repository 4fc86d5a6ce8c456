use crate::crypto::{
    AesKey, CryptoBackend, CryptoError, EcdsaPrivateKey, EcdsaPublicKey, HmacKey, AES_BLOCK_SIZE,
};
use crate::metainfo::MetaInfo;
use crate::name::{Name, NameComponent, NameError};
use crate::signature::{SignError, Signature, SignatureType, SIGNATURE_BUFFER_SIZE};
use crate::tlv::{
    block_size, var_size, Decoder, Encoder, TlvError, TLV_AES_IV, TLV_CONTENT, TLV_DATA,
    TLV_ENCRYPTED_CONTENT, TLV_ENCRYPTED_PAYLOAD, TLV_SIGNATURE_INFO,
};

/// Maximum content bytes a Data packet can carry.
pub const CONTENT_BUFFER_SIZE: usize = 256;

// Head-room reserved before the body on the ECDSA path: the widest
// possible outer type plus length fields. The slack is discarded when the
// body is shifted down after signing.
const DATA_HEADROOM: usize = 10;

/// A Data packet under assembly or after parsing.
///
/// The Data TLV body is always `name ‖ metainfo ‖ content ‖ signature-info
/// ‖ signature-value`, and the signature covers exactly the body minus the
/// signature value block.
#[derive(Clone, Debug)]
pub struct Data {
    pub name: Name,
    pub meta_info: MetaInfo,
    content: [u8; CONTENT_BUFFER_SIZE],
    content_len: usize,
    pub signature: Signature,
}

impl Data {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            meta_info: MetaInfo::new(),
            content: [0; CONTENT_BUFFER_SIZE],
            content_len: 0,
            signature: Signature::new(SignatureType::DigestSha256),
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content[..self.content_len]
    }

    pub fn set_content(&mut self, bytes: &[u8]) -> Result<(), SignError> {
        if bytes.len() > CONTENT_BUFFER_SIZE {
            return Err(SignError::Tlv(TlvError::Oversize));
        }
        self.content[..bytes.len()].copy_from_slice(bytes);
        self.content_len = bytes.len();
        Ok(())
    }

    /// Wire size of the signed region: name, metainfo, content block and
    /// signature info.
    fn unsigned_length(&self) -> usize {
        self.name.encoded_length()
            + self.meta_info.encoded_length()
            + block_size(TLV_CONTENT, self.content_len)
            + self.signature.info_encoded_length()
    }

    fn encode_unsigned(&self, enc: &mut Encoder) -> Result<(), TlvError> {
        self.name.encode(enc)?;
        self.meta_info.encode(enc)?;
        enc.put_block(TLV_CONTENT, self.content())?;
        self.signature.encode_info(enc)
    }

    /// Signs with a plain SHA-256 digest. The signature size is fixed, so
    /// the whole packet length is known before anything is emitted.
    pub fn encode_digest_signed<C: CryptoBackend>(
        &mut self,
        buf: &mut [u8],
        crypto: &mut C,
    ) -> Result<usize, SignError> {
        self.signature.reset(SignatureType::DigestSha256);
        self.signature.key_locator = None;

        let body_len = self.unsigned_length() + self.signature.value_encoded_length();
        let mut enc = Encoder::new(buf);
        enc.put_var(TLV_DATA as u64)?;
        enc.put_var(body_len as u64)?;

        let sign_start = enc.offset();
        self.encode_unsigned(&mut enc)?;
        let sign_end = enc.offset();

        let mut digest = [0u8; 32];
        crypto.sha256(enc.slice(sign_start, sign_end), &mut digest);
        self.signature.set_value(&digest)?;

        self.signature.encode_value(&mut enc)?;
        Ok(enc.offset())
    }

    /// Signs with HMAC-SHA256; the key locator names the signing key as
    /// `identity ‖ "KEY" ‖ key-id`.
    pub fn encode_hmac_signed<C: CryptoBackend>(
        &mut self,
        buf: &mut [u8],
        crypto: &mut C,
        identity: &Name,
        key: &HmacKey,
    ) -> Result<usize, SignError> {
        self.signature.reset(SignatureType::HmacWithSha256);
        self.signature
            .set_key_locator(&key_locator_name(identity, key.key_id())?);

        let body_len = self.unsigned_length() + self.signature.value_encoded_length();
        let mut enc = Encoder::new(buf);
        enc.put_var(TLV_DATA as u64)?;
        enc.put_var(body_len as u64)?;

        let sign_start = enc.offset();
        self.encode_unsigned(&mut enc)?;
        let sign_end = enc.offset();

        let mut mac = [0u8; 32];
        crypto.hmac_sha256(key, enc.slice(sign_start, sign_end), &mut mac)?;
        self.signature.set_value(&mac)?;

        self.signature.encode_value(&mut enc)?;
        Ok(enc.offset())
    }

    /// Signs with ECDSA P-256. The DER signature length is only known
    /// after signing, yet the outer length field precedes the body, so the
    /// body is emitted behind head-room first, the header is patched in
    /// right before it, and the region is then shifted down to offset 0.
    pub fn encode_ecdsa_signed<C: CryptoBackend>(
        &mut self,
        buf: &mut [u8],
        crypto: &mut C,
        identity: &Name,
        key: &EcdsaPrivateKey,
    ) -> Result<usize, SignError> {
        self.signature.reset(SignatureType::Sha256WithEcdsa);
        self.signature
            .set_key_locator(&key_locator_name(identity, key.key_id())?);

        let mut enc = Encoder::new(buf);
        enc.move_forward(DATA_HEADROOM)?;

        let sign_start = enc.offset();
        self.encode_unsigned(&mut enc)?;
        let sign_end = enc.offset();

        let mut sig_buf = [0u8; SIGNATURE_BUFFER_SIZE];
        let sig_len = crypto.ecdsa_sign(key, enc.slice(sign_start, sign_end), &mut sig_buf)?;
        self.signature.set_value(&sig_buf[..sig_len])?;

        let body_len = (sign_end - sign_start) + self.signature.value_encoded_length();
        let header_len = var_size(TLV_DATA as u64) + var_size(body_len as u64);
        let header_start = sign_start - header_len;

        enc.move_backward(sign_end - header_start)?;
        enc.put_var(TLV_DATA as u64)?;
        enc.put_var(body_len as u64)?;
        enc.move_forward(sign_end - enc.offset())?;
        enc.shift_to_front(header_start);

        self.signature.encode_value(&mut enc)?;
        Ok(enc.offset())
    }

    /// Parses a Data TLV without checking its signature.
    pub fn decode(bytes: &[u8]) -> Result<Self, SignError> {
        let (data, _, _) = Self::decode_inner(&mut Decoder::new(bytes))?;
        Ok(data)
    }

    /// Parses and checks a SHA-256 digest signature.
    pub fn decode_and_verify_digest<C: CryptoBackend>(
        bytes: &[u8],
        crypto: &mut C,
    ) -> Result<Self, SignError> {
        let (data, sign_start, sign_end) = Self::decode_inner(&mut Decoder::new(bytes))?;
        let mut digest = [0u8; 32];
        crypto.sha256(&bytes[sign_start..sign_end], &mut digest);
        if data.signature.value() != digest {
            return Err(SignError::Crypto(CryptoError::VerificationFailed));
        }
        Ok(data)
    }

    /// Parses and checks an HMAC-SHA256 signature against `key`.
    pub fn decode_and_verify_hmac<C: CryptoBackend>(
        bytes: &[u8],
        crypto: &mut C,
        key: &HmacKey,
    ) -> Result<Self, SignError> {
        let (data, sign_start, sign_end) = Self::decode_inner(&mut Decoder::new(bytes))?;
        let mut mac = [0u8; 32];
        crypto.hmac_sha256(key, &bytes[sign_start..sign_end], &mut mac)?;
        if data.signature.value() != mac {
            return Err(SignError::Crypto(CryptoError::VerificationFailed));
        }
        Ok(data)
    }

    /// Parses and checks a DER-encoded ECDSA P-256 signature against `key`.
    pub fn decode_and_verify_ecdsa<C: CryptoBackend>(
        bytes: &[u8],
        crypto: &mut C,
        key: &EcdsaPublicKey,
    ) -> Result<Self, SignError> {
        let (data, sign_start, sign_end) = Self::decode_inner(&mut Decoder::new(bytes))?;
        crypto.ecdsa_verify(key, &bytes[sign_start..sign_end], data.signature.value())?;
        Ok(data)
    }

    fn decode_inner(dec: &mut Decoder) -> Result<(Self, usize, usize), SignError> {
        dec.expect_type(TLV_DATA)?;
        dec.get_length()?;
        let sign_start = dec.offset();

        let name = Name::decode(dec)?;
        let meta_info = MetaInfo::decode(dec)?;
        let mut data = Self::new(name);
        data.meta_info = meta_info;

        match dec.peek_type()? {
            TLV_CONTENT => {
                dec.expect_type(TLV_CONTENT)?;
                let content_len = dec.get_length()?;
                if content_len > CONTENT_BUFFER_SIZE {
                    return Err(SignError::Tlv(TlvError::Oversize));
                }
                let bytes = dec.get_bytes(content_len)?;
                data.content[..content_len].copy_from_slice(bytes);
                data.content_len = content_len;
            }
            // No content block; the signature info follows directly.
            TLV_SIGNATURE_INFO => {}
            _ => return Err(SignError::Tlv(TlvError::WrongType)),
        }

        data.signature = Signature::decode_info(dec)?;
        let sign_end = dec.offset();
        data.signature.decode_value(dec)?;
        Ok((data, sign_start, sign_end))
    }

    /// Encrypts `plaintext` (a block multiple; this helper does not pad)
    /// and stores `EncryptedContent { key-id name, IV, payload }` as this
    /// packet's content. The stored content length is taken from the bytes
    /// actually written for the fresh ciphertext.
    pub fn set_encrypted_content<C: CryptoBackend>(
        &mut self,
        crypto: &mut C,
        plaintext: &[u8],
        key_id_name: &Name,
        iv: &[u8; AES_BLOCK_SIZE],
        key: &AesKey,
    ) -> Result<(), SignError> {
        if plaintext.len() > CONTENT_BUFFER_SIZE {
            return Err(SignError::Tlv(TlvError::Oversize));
        }
        let mut ciphertext = [0u8; CONTENT_BUFFER_SIZE];
        let ciphertext_len = crypto.aes_cbc_encrypt(key, iv, plaintext, &mut ciphertext)?;

        let inner_len = key_id_name.encoded_length()
            + block_size(TLV_AES_IV, AES_BLOCK_SIZE)
            + block_size(TLV_ENCRYPTED_PAYLOAD, ciphertext_len);
        if block_size(TLV_ENCRYPTED_CONTENT, inner_len) > CONTENT_BUFFER_SIZE {
            return Err(SignError::Tlv(TlvError::Oversize));
        }

        let mut enc = Encoder::new(&mut self.content);
        enc.put_var(TLV_ENCRYPTED_CONTENT as u64)?;
        enc.put_var(inner_len as u64)?;
        key_id_name.encode(&mut enc)?;
        enc.put_block(TLV_AES_IV, iv)?;
        enc.put_block(TLV_ENCRYPTED_PAYLOAD, &ciphertext[..ciphertext_len])?;
        self.content_len = enc.offset();
        Ok(())
    }

    /// Reverses `set_encrypted_content`: decrypts the payload into `out`
    /// and returns the key-id name, the IV and the plaintext length.
    pub fn parse_encrypted_content<C: CryptoBackend>(
        &self,
        crypto: &mut C,
        out: &mut [u8],
        key: &AesKey,
    ) -> Result<(Name, [u8; AES_BLOCK_SIZE], usize), SignError> {
        let mut dec = Decoder::new(self.content());
        dec.expect_type(TLV_ENCRYPTED_CONTENT)?;
        dec.get_length()?;

        let key_id_name = Name::decode(&mut dec)?;

        dec.expect_type(TLV_AES_IV)?;
        let iv_len = dec.get_length()?;
        let iv: [u8; AES_BLOCK_SIZE] = dec
            .get_bytes(iv_len)?
            .try_into()
            .map_err(|_| SignError::Tlv(TlvError::WrongType))?;

        dec.expect_type(TLV_ENCRYPTED_PAYLOAD)?;
        let payload_len = dec.get_length()?;
        let payload = dec.get_bytes(payload_len)?;

        let plaintext_len = crypto.aes_cbc_decrypt(key, &iv, payload, out)?;
        Ok((key_id_name, iv, plaintext_len))
    }
}

/// `identity ‖ "KEY" ‖ BE32(key-id)`, the name a verifier resolves the
/// signing key by.
pub fn key_locator_name(identity: &Name, key_id: u32) -> Result<Name, NameError> {
    identity
        .appending(NameComponent::generic(b"KEY")?)?
        .appending(NameComponent::generic(&key_id.to_be_bytes())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::TLV_SIGNATURE_VALUE;

    // A backend that "signs" with a configurable-length filler, enough to
    // exercise the layout and backpatch logic without real cryptography.
    struct StubCrypto {
        ecdsa_sig_len: usize,
    }

    impl CryptoBackend for StubCrypto {
        fn sha256(&mut self, _input: &[u8], out: &mut [u8; 32]) {
            *out = [0x11; 32];
        }

        fn hmac_sha256(
            &mut self,
            _key: &HmacKey,
            _input: &[u8],
            out: &mut [u8; 32],
        ) -> Result<(), CryptoError> {
            *out = [0x22; 32];
            Ok(())
        }

        fn ecdsa_sign(
            &mut self,
            _key: &EcdsaPrivateKey,
            _input: &[u8],
            sig_out: &mut [u8],
        ) -> Result<usize, CryptoError> {
            if self.ecdsa_sig_len > sig_out.len() {
                return Err(CryptoError::BufferTooSmall);
            }
            sig_out[..self.ecdsa_sig_len].fill(0xAB);
            Ok(self.ecdsa_sig_len)
        }

        fn ecdsa_verify(
            &mut self,
            _key: &EcdsaPublicKey,
            _input: &[u8],
            sig: &[u8],
        ) -> Result<(), CryptoError> {
            if sig.iter().all(|b| *b == 0xAB) {
                Ok(())
            } else {
                Err(CryptoError::VerificationFailed)
            }
        }

        fn aes_cbc_encrypt(
            &mut self,
            _key: &AesKey,
            _iv: &[u8; AES_BLOCK_SIZE],
            input: &[u8],
            out: &mut [u8],
        ) -> Result<usize, CryptoError> {
            out[..input.len()].copy_from_slice(input);
            Ok(input.len())
        }

        fn aes_cbc_decrypt(
            &mut self,
            _key: &AesKey,
            _iv: &[u8; AES_BLOCK_SIZE],
            input: &[u8],
            out: &mut [u8],
        ) -> Result<usize, CryptoError> {
            out[..input.len()].copy_from_slice(input);
            Ok(input.len())
        }

        fn fill_random(&mut self, dest: &mut [u8]) -> Result<(), CryptoError> {
            dest.fill(0x5A);
            Ok(())
        }
    }

    #[test]
    fn test_digest_layout() {
        let mut crypto = StubCrypto { ecdsa_sig_len: 0 };
        let mut data = Data::new(Name::from_string("/hello/world").unwrap());
        data.set_content(b"Hi").unwrap();

        let mut buf = [0u8; 512];
        let n = data.encode_digest_signed(&mut buf, &mut crypto).unwrap();

        // Total length is the probed parts plus the outer type and length.
        let body = data.name.encoded_length()
            + data.meta_info.encoded_length()
            + block_size(TLV_CONTENT, 2)
            + data.signature.info_encoded_length()
            + data.signature.value_encoded_length();
        assert_eq!(n, var_size(TLV_DATA as u64) + var_size(body as u64) + body);

        // The outer length field matches the body exactly.
        let mut dec = Decoder::new(&buf[..n]);
        dec.expect_type(TLV_DATA).unwrap();
        assert_eq!(dec.get_length().unwrap(), body);

        let decoded = Data::decode_and_verify_digest(&buf[..n], &mut crypto).unwrap();
        assert_eq!(decoded.name, data.name);
        assert_eq!(decoded.content(), b"Hi");
    }

    #[test]
    fn test_ecdsa_backpatch_layouts() {
        // The same packet with 70- and 71-byte signatures must both come
        // out with a correct outer length and verify.
        for sig_len in [70usize, 71, 72] {
            let mut crypto = StubCrypto { ecdsa_sig_len: sig_len };
            let identity = Name::from_string("/producer").unwrap();
            let key = EcdsaPrivateKey::new(1, [0x33; 32]);

            let mut data = Data::new(Name::from_string("/sensor/temp/1").unwrap());
            data.set_content(b"22.5C").unwrap();

            let mut buf = [0u8; 512];
            let n = data
                .encode_ecdsa_signed(&mut buf, &mut crypto, &identity, &key)
                .unwrap();

            let mut dec = Decoder::new(&buf[..n]);
            dec.expect_type(TLV_DATA).unwrap();
            let body = dec.get_length().unwrap();
            assert_eq!(n, var_size(TLV_DATA as u64) + var_size(body as u64) + body);
            assert_eq!(body, dec.remaining());

            let public = EcdsaPublicKey::new(1, &[0x04; 65]).unwrap();
            let decoded = Data::decode_and_verify_ecdsa(&buf[..n], &mut crypto, &public).unwrap();
            assert_eq!(decoded.signature.value().len(), sig_len);
            assert_eq!(decoded.content(), b"22.5C");
        }
    }

    #[test]
    fn test_hmac_key_locator() {
        let mut crypto = StubCrypto { ecdsa_sig_len: 0 };
        let identity = Name::from_string("/producer").unwrap();
        let key = HmacKey::new(42, &[0x44; 32]).unwrap();

        let mut data = Data::new(Name::from_string("/a").unwrap());
        let mut buf = [0u8; 512];
        let n = data
            .encode_hmac_signed(&mut buf, &mut crypto, &identity, &key)
            .unwrap();

        let decoded = Data::decode(&buf[..n]).unwrap();
        let expected = key_locator_name(&identity, 42).unwrap();
        assert_eq!(decoded.signature.key_locator, Some(expected));
    }

    #[test]
    fn test_decode_without_content() {
        let mut crypto = StubCrypto { ecdsa_sig_len: 0 };
        let mut data = Data::new(Name::from_string("/empty").unwrap());

        let mut buf = [0u8; 256];
        let n = data.encode_digest_signed(&mut buf, &mut crypto).unwrap();

        // Splice the zero-length content block out of the packet, fixing
        // the outer length: the decoder must then find the signature info
        // right after the metainfo.
        let mut dec = Decoder::new(&buf[..n]);
        dec.expect_type(TLV_DATA).unwrap();
        let body = dec.get_length().unwrap();
        let body_start = dec.offset();
        let name_len = data.name.encoded_length();
        let meta_len = data.meta_info.encoded_length();
        let content_start = body_start + name_len + meta_len;

        let mut spliced = [0u8; 256];
        let mut enc = Encoder::new(&mut spliced);
        enc.put_var(TLV_DATA as u64).unwrap();
        enc.put_var((body - 2) as u64).unwrap();
        enc.put_bytes(&buf[body_start..content_start]).unwrap();
        enc.put_bytes(&buf[content_start + 2..n]).unwrap();
        let spliced_len = enc.offset();

        let decoded = Data::decode(&spliced[..spliced_len]).unwrap();
        assert_eq!(decoded.content(), b"");

        // An unexpected block in the content position is rejected.
        let mut bad = [0u8; 256];
        let mut enc = Encoder::new(&mut bad);
        enc.put_var(TLV_DATA as u64).unwrap();
        enc.put_var(body as u64).unwrap();
        enc.put_bytes(&buf[body_start..content_start]).unwrap();
        enc.put_block(99, &[]).unwrap();
        enc.put_bytes(&buf[content_start + 2..n]).unwrap();
        let bad_len = enc.offset();
        assert_eq!(
            Data::decode(&bad[..bad_len]).unwrap_err(),
            SignError::Tlv(TlvError::WrongType)
        );
    }

    #[test]
    fn test_oversize_content_rejected() {
        // A content block longer than the buffer must fail on decode.
        let mut crypto = StubCrypto { ecdsa_sig_len: 0 };
        let mut data = Data::new(Name::from_string("/big").unwrap());
        data.set_content(&[0x77; CONTENT_BUFFER_SIZE]).unwrap();

        let mut buf = [0u8; 1024];
        let n = data.encode_digest_signed(&mut buf, &mut crypto).unwrap();

        // Grow the content length field by hand: 256 encodes as FD 01 00,
        // patch it to FD 01 01 (257) and pad the buffer accordingly.
        let mut grown = [0u8; 1024];
        grown[..n].copy_from_slice(&buf[..n]);
        let mut dec = Decoder::new(&buf[..n]);
        dec.expect_type(TLV_DATA).unwrap();
        dec.get_length().unwrap();
        let content_len_offset =
            dec.offset() + data.name.encoded_length() + data.meta_info.encoded_length() + 1;
        assert_eq!(&grown[content_len_offset..content_len_offset + 3], &[253, 1, 0]);
        grown[content_len_offset + 2] = 1;

        assert_eq!(
            Data::decode(&grown[..n + 1]).unwrap_err(),
            SignError::Tlv(TlvError::Oversize)
        );

        assert_eq!(
            Data::new(Name::from_string("/x").unwrap())
                .set_content(&[0; CONTENT_BUFFER_SIZE + 1])
                .unwrap_err(),
            SignError::Tlv(TlvError::Oversize)
        );
    }

    #[test]
    fn test_encrypted_content_length_uses_fresh_ciphertext() {
        // The stored content length must reflect the ciphertext written in
        // this call, even when the packet previously held longer content.
        let mut crypto = StubCrypto { ecdsa_sig_len: 0 };
        let mut data = Data::new(Name::from_string("/enc").unwrap());
        data.set_content(&[0xEE; 200]).unwrap();

        let key_id_name = Name::from_string("/keys/1").unwrap();
        let key = AesKey::new(1, [0x10; 16]);
        let iv = [0x20; 16];
        data.set_encrypted_content(&mut crypto, &[0x0F; 16], &key_id_name, &iv, &key)
            .unwrap();

        let expected_inner = key_id_name.encoded_length()
            + block_size(TLV_AES_IV, AES_BLOCK_SIZE)
            + block_size(TLV_ENCRYPTED_PAYLOAD, 16);
        assert_eq!(
            data.content().len(),
            block_size(TLV_ENCRYPTED_CONTENT, expected_inner)
        );

        let mut out = [0u8; 64];
        let (parsed_name, parsed_iv, plaintext_len) = data
            .parse_encrypted_content(&mut crypto, &mut out, &key)
            .unwrap();
        assert_eq!(parsed_name, key_id_name);
        assert_eq!(parsed_iv, iv);
        assert_eq!(&out[..plaintext_len], &[0x0F; 16]);
    }

    #[test]
    fn test_signature_value_is_last_block() {
        let mut crypto = StubCrypto { ecdsa_sig_len: 70 };
        let identity = Name::from_string("/p").unwrap();
        let key = EcdsaPrivateKey::new(9, [1; 32]);
        let mut data = Data::new(Name::from_string("/n").unwrap());

        let mut buf = [0u8; 512];
        let n = data
            .encode_ecdsa_signed(&mut buf, &mut crypto, &identity, &key)
            .unwrap();

        // Walk to the final block and check it is the signature value.
        let mut dec = Decoder::new(&buf[..n]);
        dec.expect_type(TLV_DATA).unwrap();
        dec.get_length().unwrap();
        Name::decode(&mut dec).unwrap();
        MetaInfo::decode(&mut dec).unwrap();
        dec.expect_type(TLV_CONTENT).unwrap();
        let content_len = dec.get_length().unwrap();
        dec.get_bytes(content_len).unwrap();
        Signature::decode_info(&mut dec).unwrap();
        dec.expect_type(TLV_SIGNATURE_VALUE).unwrap();
        let sig_len = dec.get_length().unwrap();
        assert_eq!(sig_len, 70);
        dec.get_bytes(sig_len).unwrap();
        assert_eq!(dec.remaining(), 0);
    }
}
