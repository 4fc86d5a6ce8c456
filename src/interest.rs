use crate::name::{Name, NameError};
use crate::tlv::{
    block_size, nonneg_int_block_size, var_size, Decoder, Encoder, TlvError, TLV_CAN_BE_PREFIX,
    TLV_HOP_LIMIT, TLV_INTEREST, TLV_INTEREST_LIFETIME, TLV_MUST_BE_FRESH, TLV_NONCE,
};

/// A minimal Interest: enough for an application to express requests
/// through the direct face. Signed-interest parameters are not modeled.
#[derive(Debug)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub nonce: Option<[u8; 4]>,
    pub lifetime_ms: Option<u64>,
    pub hop_limit: Option<u8>,
}

// An unknown TLV type we may not skip silently.
fn is_critical(typ: u64) -> bool {
    typ < 32 || typ & 1 == 1
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            nonce: None,
            lifetime_ms: None,
            hop_limit: None,
        }
    }

    fn value_length(&self) -> usize {
        let mut len = self.name.encoded_length();
        if self.can_be_prefix {
            len += block_size(TLV_CAN_BE_PREFIX, 0);
        }
        if self.must_be_fresh {
            len += block_size(TLV_MUST_BE_FRESH, 0);
        }
        if self.nonce.is_some() {
            len += block_size(TLV_NONCE, 4);
        }
        if let Some(lifetime_ms) = self.lifetime_ms {
            len += nonneg_int_block_size(TLV_INTEREST_LIFETIME, lifetime_ms);
        }
        if self.hop_limit.is_some() {
            len += block_size(TLV_HOP_LIMIT, 1);
        }
        len
    }

    pub fn encoded_length(&self) -> usize {
        let value_length = self.value_length();
        var_size(TLV_INTEREST as u64) + var_size(value_length as u64) + value_length
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<(), TlvError> {
        enc.put_var(TLV_INTEREST as u64)?;
        enc.put_var(self.value_length() as u64)?;
        self.name.encode(enc)?;
        if self.can_be_prefix {
            enc.put_block(TLV_CAN_BE_PREFIX, &[])?;
        }
        if self.must_be_fresh {
            enc.put_block(TLV_MUST_BE_FRESH, &[])?;
        }
        if let Some(nonce) = &self.nonce {
            enc.put_block(TLV_NONCE, nonce)?;
        }
        if let Some(lifetime_ms) = self.lifetime_ms {
            enc.put_nonneg_int(TLV_INTEREST_LIFETIME, lifetime_ms)?;
        }
        if let Some(hop_limit) = self.hop_limit {
            enc.put_block(TLV_HOP_LIMIT, &[hop_limit])?;
        }
        Ok(())
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self, NameError> {
        dec.expect_type(TLV_INTEREST)?;
        let len = dec.get_length()?;
        let end = dec.offset() + len;

        let mut interest = Self::new(Name::decode(dec)?);
        while dec.offset() < end {
            let typ = dec.get_var()?;
            let inner_len = dec.get_length()?;
            if dec.offset() + inner_len > end {
                return Err(NameError::Tlv(TlvError::WrongType));
            }
            match u32::try_from(typ) {
                Ok(TLV_CAN_BE_PREFIX) => interest.can_be_prefix = true,
                Ok(TLV_MUST_BE_FRESH) => interest.must_be_fresh = true,
                Ok(TLV_NONCE) => {
                    let bytes: [u8; 4] = dec
                        .get_bytes(inner_len)?
                        .try_into()
                        .map_err(|_| TlvError::WrongType)?;
                    interest.nonce = Some(bytes);
                }
                Ok(TLV_INTEREST_LIFETIME) => {
                    interest.lifetime_ms = Some(dec.get_nonneg_int(inner_len)?);
                }
                Ok(TLV_HOP_LIMIT) => {
                    let bytes = dec.get_bytes(inner_len)?;
                    if bytes.len() != 1 {
                        return Err(NameError::Tlv(TlvError::WrongType));
                    }
                    interest.hop_limit = Some(bytes[0]);
                }
                _ => {
                    if is_critical(typ) {
                        return Err(NameError::Tlv(TlvError::WrongType));
                    }
                    dec.get_bytes(inner_len)?;
                }
            }
        }
        Ok(interest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut interest = Interest::new(Name::from_string("/svc/op/1").unwrap());
        interest.can_be_prefix = true;
        interest.must_be_fresh = true;
        interest.nonce = Some([1, 2, 3, 4]);
        interest.lifetime_ms = Some(4000);
        interest.hop_limit = Some(8);

        let mut buf = [0u8; 128];
        let mut enc = Encoder::new(&mut buf);
        interest.encode(&mut enc).unwrap();
        assert_eq!(enc.offset(), interest.encoded_length());

        let mut dec = Decoder::new(enc.written());
        let decoded = Interest::decode(&mut dec).unwrap();
        assert_eq!(decoded.name, interest.name);
        assert!(decoded.can_be_prefix);
        assert!(decoded.must_be_fresh);
        assert_eq!(decoded.nonce, Some([1, 2, 3, 4]));
        assert_eq!(decoded.lifetime_ms, Some(4000));
        assert_eq!(decoded.hop_limit, Some(8));
    }

    #[test]
    fn test_minimal_round_trip() {
        let interest = Interest::new(Name::from_string("/a").unwrap());
        let mut buf = [0u8; 32];
        let mut enc = Encoder::new(&mut buf);
        interest.encode(&mut enc).unwrap();

        let mut dec = Decoder::new(enc.written());
        let decoded = Interest::decode(&mut dec).unwrap();
        assert_eq!(decoded.name, interest.name);
        assert!(!decoded.can_be_prefix);
        assert_eq!(decoded.nonce, None);
    }

    #[test]
    fn test_critical_unknown_rejected() {
        let name = Name::from_string("/a").unwrap();
        let mut buf = [0u8; 64];
        let mut enc = Encoder::new(&mut buf);
        enc.put_var(TLV_INTEREST as u64).unwrap();
        enc.put_var((name.encoded_length() + block_size(31, 0)) as u64)
            .unwrap();
        name.encode(&mut enc).unwrap();
        // 31 is odd, hence critical; 64 is even and in the ignorable range.
        enc.put_block(31, &[]).unwrap();

        let mut dec = Decoder::new(enc.written());
        assert_eq!(
            Interest::decode(&mut dec).unwrap_err(),
            NameError::Tlv(TlvError::WrongType)
        );

        let mut enc = Encoder::new(&mut buf);
        enc.put_var(TLV_INTEREST as u64).unwrap();
        enc.put_var((name.encoded_length() + block_size(64, 2)) as u64)
            .unwrap();
        name.encode(&mut enc).unwrap();
        enc.put_block(64, &[9, 9]).unwrap();

        let mut dec = Decoder::new(enc.written());
        assert!(Interest::decode(&mut dec).is_ok());
    }
}
