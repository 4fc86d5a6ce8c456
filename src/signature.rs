use crate::crypto::CryptoError;
use crate::name::{Name, NameError};
use crate::tlv::{
    block_size, nonneg_int_block_size, var_size, Decoder, Encoder, TlvError, TLV_NOT_AFTER,
    TLV_NOT_BEFORE, TLV_SIGNATURE_INFO, TLV_SIGNATURE_KEY_LOCATOR, TLV_SIGNATURE_NONCE,
    TLV_SIGNATURE_TIME, TLV_SIGNATURE_TYPE, TLV_SIGNATURE_VALUE, TLV_VALIDITY_PERIOD,
};

/// Enough for the largest supported signature, a DER-encoded ECDSA P-256.
pub const SIGNATURE_BUFFER_SIZE: usize = 72;
pub const SHA256_SIGNATURE_SIZE: usize = 32;
pub const HMAC_SIGNATURE_SIZE: usize = 32;
pub const ECDSA_RAW_SIGNATURE_SIZE: usize = 64;
/// ISO-8601 timestamps in validity periods, e.g. `20260801T000000`.
pub const VALIDITY_TIMESTAMP_SIZE: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignError {
    UnsupportedSignatureType,
    WrongSignatureSize,
    Name(NameError),
    Tlv(TlvError),
    Crypto(CryptoError),
}

impl From<TlvError> for SignError {
    fn from(err: TlvError) -> Self {
        SignError::Tlv(err)
    }
}

impl From<NameError> for SignError {
    fn from(err: NameError) -> Self {
        SignError::Name(err)
    }
}

impl From<CryptoError> for SignError {
    fn from(err: CryptoError) -> Self {
        SignError::Crypto(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureType {
    DigestSha256,
    Sha256WithEcdsa,
    HmacWithSha256,
}

impl TryFrom<u64> for SignatureType {
    type Error = SignError;

    fn try_from(value: u64) -> Result<Self, SignError> {
        match value {
            0 => Ok(Self::DigestSha256),
            3 => Ok(Self::Sha256WithEcdsa),
            4 => Ok(Self::HmacWithSha256),
            _ => Err(SignError::UnsupportedSignatureType),
        }
    }
}

impl From<SignatureType> for u64 {
    fn from(value: SignatureType) -> Self {
        match value {
            SignatureType::DigestSha256 => 0,
            SignatureType::Sha256WithEcdsa => 3,
            SignatureType::HmacWithSha256 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ValidityPeriod {
    pub not_before: [u8; VALIDITY_TIMESTAMP_SIZE],
    pub not_after: [u8; VALIDITY_TIMESTAMP_SIZE],
}

/// Signature metadata plus the signature value itself.
///
/// The optional fields appear on the wire iff set, in the order key
/// locator, validity period, nonce, timestamp.
#[derive(Copy, Clone, Debug)]
pub struct Signature {
    typ: SignatureType,
    value: [u8; SIGNATURE_BUFFER_SIZE],
    value_len: usize,
    pub key_locator: Option<Name>,
    pub validity_period: Option<ValidityPeriod>,
    pub nonce: Option<u32>,
    pub timestamp: Option<u64>,
}

impl Signature {
    pub fn new(typ: SignatureType) -> Self {
        let value_len = match typ {
            SignatureType::DigestSha256 => SHA256_SIGNATURE_SIZE,
            SignatureType::HmacWithSha256 => HMAC_SIGNATURE_SIZE,
            // Unknown until the backend has signed.
            SignatureType::Sha256WithEcdsa => 0,
        };
        Self {
            typ,
            value: [0; SIGNATURE_BUFFER_SIZE],
            value_len,
            key_locator: None,
            validity_period: None,
            nonce: None,
            timestamp: None,
        }
    }

    pub fn signature_type(&self) -> SignatureType {
        self.typ
    }

    /// Re-arms the record for a fresh signing pass: sets the type and its
    /// implied value size, keeping any optional fields already set.
    pub fn reset(&mut self, typ: SignatureType) {
        self.typ = typ;
        self.value_len = match typ {
            SignatureType::DigestSha256 => SHA256_SIGNATURE_SIZE,
            SignatureType::HmacWithSha256 => HMAC_SIGNATURE_SIZE,
            SignatureType::Sha256WithEcdsa => 0,
        };
    }

    pub fn value(&self) -> &[u8] {
        &self.value[..self.value_len]
    }

    /// Stores the signature value, enforcing the size its type implies:
    /// exactly 32 bytes for digest and HMAC, up to the DER maximum for ECDSA.
    pub fn set_value(&mut self, bytes: &[u8]) -> Result<(), SignError> {
        let valid = match self.typ {
            SignatureType::DigestSha256 => bytes.len() == SHA256_SIGNATURE_SIZE,
            SignatureType::HmacWithSha256 => bytes.len() == HMAC_SIGNATURE_SIZE,
            SignatureType::Sha256WithEcdsa => bytes.len() <= SIGNATURE_BUFFER_SIZE,
        };
        if !valid {
            return Err(SignError::WrongSignatureSize);
        }
        self.value[..bytes.len()].copy_from_slice(bytes);
        self.value_len = bytes.len();
        Ok(())
    }

    /// Stores a raw `r ‖ s` ECDSA signature (64 bytes exactly).
    pub fn set_raw_ecdsa_value(&mut self, bytes: &[u8]) -> Result<(), SignError> {
        if self.typ != SignatureType::Sha256WithEcdsa {
            return Err(SignError::UnsupportedSignatureType);
        }
        if bytes.len() != ECDSA_RAW_SIGNATURE_SIZE {
            return Err(SignError::WrongSignatureSize);
        }
        self.value[..bytes.len()].copy_from_slice(bytes);
        self.value_len = bytes.len();
        Ok(())
    }

    /// Copies `name` in by value and enables the key locator field.
    pub fn set_key_locator(&mut self, name: &Name) {
        self.key_locator = Some(*name);
    }

    pub fn set_validity_period(
        &mut self,
        not_before: [u8; VALIDITY_TIMESTAMP_SIZE],
        not_after: [u8; VALIDITY_TIMESTAMP_SIZE],
    ) {
        self.validity_period = Some(ValidityPeriod {
            not_before,
            not_after,
        });
    }

    pub fn set_nonce(&mut self, nonce: u32) {
        self.nonce = Some(nonce);
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = Some(timestamp);
    }

    fn info_value_length(&self) -> usize {
        let mut len = block_size(TLV_SIGNATURE_TYPE, 1);
        if let Some(key_locator) = &self.key_locator {
            len += block_size(TLV_SIGNATURE_KEY_LOCATOR, key_locator.encoded_length());
        }
        if self.validity_period.is_some() {
            let inner = 2 * block_size(TLV_NOT_BEFORE, VALIDITY_TIMESTAMP_SIZE);
            len += block_size(TLV_VALIDITY_PERIOD, inner);
        }
        if self.nonce.is_some() {
            len += block_size(TLV_SIGNATURE_NONCE, 4);
        }
        if let Some(timestamp) = self.timestamp {
            len += nonneg_int_block_size(TLV_SIGNATURE_TIME, timestamp);
        }
        len
    }

    pub fn info_encoded_length(&self) -> usize {
        let value_length = self.info_value_length();
        var_size(TLV_SIGNATURE_INFO as u64) + var_size(value_length as u64) + value_length
    }

    pub fn encode_info(&self, enc: &mut Encoder) -> Result<(), TlvError> {
        enc.put_var(TLV_SIGNATURE_INFO as u64)?;
        enc.put_var(self.info_value_length() as u64)?;

        enc.put_block(TLV_SIGNATURE_TYPE, &[u64::from(self.typ) as u8])?;

        if let Some(key_locator) = &self.key_locator {
            enc.put_var(TLV_SIGNATURE_KEY_LOCATOR as u64)?;
            enc.put_var(key_locator.encoded_length() as u64)?;
            key_locator.encode(enc)?;
        }
        if let Some(validity_period) = &self.validity_period {
            enc.put_var(TLV_VALIDITY_PERIOD as u64)?;
            let inner = 2 * block_size(TLV_NOT_BEFORE, VALIDITY_TIMESTAMP_SIZE);
            enc.put_var(inner as u64)?;
            enc.put_block(TLV_NOT_BEFORE, &validity_period.not_before)?;
            enc.put_block(TLV_NOT_AFTER, &validity_period.not_after)?;
        }
        if let Some(nonce) = self.nonce {
            enc.put_block(TLV_SIGNATURE_NONCE, &nonce.to_be_bytes())?;
        }
        if let Some(timestamp) = self.timestamp {
            enc.put_nonneg_int(TLV_SIGNATURE_TIME, timestamp)?;
        }
        Ok(())
    }

    pub fn decode_info(dec: &mut Decoder) -> Result<Self, SignError> {
        dec.expect_type(TLV_SIGNATURE_INFO)?;
        let len = dec.get_length()?;
        let end = dec.offset() + len;

        dec.expect_type(TLV_SIGNATURE_TYPE)?;
        let typ_len = dec.get_length()?;
        let typ = SignatureType::try_from(dec.get_nonneg_int(typ_len)?)?;
        let mut signature = Self::new(typ);

        while dec.offset() < end {
            let typ = dec.get_var()?;
            let inner_len = dec.get_length()?;
            if dec.offset() + inner_len > end {
                return Err(SignError::Tlv(TlvError::WrongType));
            }
            match u32::try_from(typ) {
                Ok(TLV_SIGNATURE_KEY_LOCATOR) => {
                    signature.key_locator = Some(Name::decode(dec)?);
                }
                Ok(TLV_VALIDITY_PERIOD) => {
                    dec.expect_type(TLV_NOT_BEFORE)?;
                    let not_before_len = dec.get_length()?;
                    let not_before = dec.get_bytes(not_before_len)?;
                    dec.expect_type(TLV_NOT_AFTER)?;
                    let not_after_len = dec.get_length()?;
                    let not_after = dec.get_bytes(not_after_len)?;
                    let not_before = not_before
                        .try_into()
                        .map_err(|_| SignError::Tlv(TlvError::WrongType))?;
                    let not_after = not_after
                        .try_into()
                        .map_err(|_| SignError::Tlv(TlvError::WrongType))?;
                    signature.validity_period = Some(ValidityPeriod {
                        not_before,
                        not_after,
                    });
                }
                Ok(TLV_SIGNATURE_NONCE) => {
                    let bytes = dec.get_bytes(inner_len)?;
                    let bytes: [u8; 4] =
                        bytes.try_into().map_err(|_| SignError::Tlv(TlvError::WrongType))?;
                    signature.nonce = Some(u32::from_be_bytes(bytes));
                }
                Ok(TLV_SIGNATURE_TIME) => {
                    signature.timestamp = Some(dec.get_nonneg_int(inner_len)?);
                }
                // Unknown fields are skipped.
                _ => {
                    dec.get_bytes(inner_len)?;
                }
            }
        }
        Ok(signature)
    }

    pub fn value_encoded_length(&self) -> usize {
        block_size(TLV_SIGNATURE_VALUE, self.value_len)
    }

    pub fn encode_value(&self, enc: &mut Encoder) -> Result<(), TlvError> {
        enc.put_block(TLV_SIGNATURE_VALUE, self.value())
    }

    pub fn decode_value(&mut self, dec: &mut Decoder) -> Result<(), SignError> {
        dec.expect_type(TLV_SIGNATURE_VALUE)?;
        let len = dec.get_length()?;
        let bytes = dec.get_bytes(len)?;
        self.set_value(bytes)
    }
}
