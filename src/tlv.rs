// NDN TLV type assignments used across the crate.
pub const TLV_INTEREST: u32 = 5;
pub const TLV_DATA: u32 = 6;

pub const TLV_NAME: u32 = 7;
pub const TLV_GENERIC_NAME_COMPONENT: u32 = 8;

pub const TLV_META_INFO: u32 = 20;
pub const TLV_CONTENT: u32 = 21;
pub const TLV_SIGNATURE_INFO: u32 = 22;
pub const TLV_SIGNATURE_VALUE: u32 = 23;

pub const TLV_CAN_BE_PREFIX: u32 = 33;
pub const TLV_MUST_BE_FRESH: u32 = 18;
pub const TLV_NONCE: u32 = 10;
pub const TLV_INTEREST_LIFETIME: u32 = 12;
pub const TLV_HOP_LIMIT: u32 = 34;

pub const TLV_META_INFO_CONTENT_TYPE: u32 = 24;
pub const TLV_META_INFO_FRESHNESS_PERIOD: u32 = 25;
pub const TLV_META_INFO_FINAL_BLOCK_ID: u32 = 26;

pub const TLV_SIGNATURE_TYPE: u32 = 27;
pub const TLV_SIGNATURE_KEY_LOCATOR: u32 = 29;
pub const TLV_SIGNATURE_NONCE: u32 = 38;
pub const TLV_SIGNATURE_TIME: u32 = 40;
pub const TLV_VALIDITY_PERIOD: u32 = 253;
pub const TLV_NOT_BEFORE: u32 = 254;
pub const TLV_NOT_AFTER: u32 = 255;

// Application-range types for access-controlled content.
pub const TLV_ENCRYPTED_CONTENT: u32 = 130;
pub const TLV_AES_IV: u32 = 131;
pub const TLV_ENCRYPTED_PAYLOAD: u32 = 132;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvError {
    /// A buffer, name, content or signature exceeds its capacity.
    Oversize,
    /// The decoder found a TLV type other than the expected one.
    WrongType,
}

/// Width of a variable-size type or length field holding `v`.
pub fn var_size(v: u64) -> usize {
    if v <= 252 {
        1
    } else if v <= 65535 {
        3
    } else if v <= 4294967295 {
        5
    } else {
        9
    }
}

/// Total wire size of a TLV block with the given type and value length.
pub fn block_size(typ: u32, value_len: usize) -> usize {
    var_size(typ as u64) + var_size(value_len as u64) + value_len
}

/// Width of a NonNegativeInteger value field (1, 2, 4 or 8 bytes).
pub fn nonneg_int_size(v: u64) -> usize {
    if v <= u8::MAX as u64 {
        1
    } else if v <= u16::MAX as u64 {
        2
    } else if v <= u32::MAX as u64 {
        4
    } else {
        8
    }
}

/// Total wire size of a TLV block whose value is a NonNegativeInteger.
pub fn nonneg_int_block_size(typ: u32, v: u64) -> usize {
    block_size(typ, nonneg_int_size(v))
}

/// Appends TLV fields to a caller-provided buffer at an advancing offset.
///
/// Every operation bounds-checks against the buffer capacity and fails with
/// `TlvError::Oversize` rather than grow. On failure the offset stays at the
/// point of failure and the written bytes are indeterminate.
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn written(&self) -> &[u8] {
        &self.buf[..self.offset]
    }

    pub fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.buf[start..end]
    }

    pub fn put_var(&mut self, v: u64) -> Result<(), TlvError> {
        if v <= 252 {
            self.put_raw(&[v as u8])
        } else if v <= 65535 {
            self.put_raw(&[253])?;
            self.put_raw(&(v as u16).to_be_bytes())
        } else if v <= 4294967295 {
            self.put_raw(&[254])?;
            self.put_raw(&(v as u32).to_be_bytes())
        } else {
            self.put_raw(&[255])?;
            self.put_raw(&v.to_be_bytes())
        }
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), TlvError> {
        self.put_raw(bytes)
    }

    pub fn put_block(&mut self, typ: u32, value: &[u8]) -> Result<(), TlvError> {
        self.put_var(typ as u64)?;
        self.put_var(value.len() as u64)?;
        self.put_raw(value)
    }

    pub fn put_nonneg_int(&mut self, typ: u32, v: u64) -> Result<(), TlvError> {
        self.put_var(typ as u64)?;
        let n = nonneg_int_size(v);
        self.put_var(n as u64)?;
        match n {
            1 => self.put_raw(&[v as u8]),
            2 => self.put_raw(&(v as u16).to_be_bytes()),
            4 => self.put_raw(&(v as u32).to_be_bytes()),
            _ => self.put_raw(&v.to_be_bytes()),
        }
    }

    /// Reserves `n` bytes, e.g. head-room for a length to be patched later.
    pub fn move_forward(&mut self, n: usize) -> Result<(), TlvError> {
        if self.offset + n > self.buf.len() {
            return Err(TlvError::Oversize);
        }
        self.offset += n;
        Ok(())
    }

    /// Rewinds the offset by `n` bytes for overwriting.
    pub fn move_backward(&mut self, n: usize) -> Result<(), TlvError> {
        if n > self.offset {
            return Err(TlvError::Oversize);
        }
        self.offset -= n;
        Ok(())
    }

    /// Moves the written region `[start, offset)` down to the buffer start
    /// and re-seats the offset just past the moved bytes. Used to discard
    /// unused head-room after a length field has been patched in place.
    pub fn shift_to_front(&mut self, start: usize) {
        debug_assert!(start <= self.offset);
        self.buf.copy_within(start..self.offset, 0);
        self.offset -= start;
    }

    fn put_raw(&mut self, bytes: &[u8]) -> Result<(), TlvError> {
        let end = self.offset + bytes.len();
        if end > self.buf.len() {
            return Err(TlvError::Oversize);
        }
        self.buf[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
        Ok(())
    }
}

/// Reads TLV fields from a byte slice at an advancing offset.
pub struct Decoder<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn get_var(&mut self) -> Result<u64, TlvError> {
        let (v, width) = Self::parse_var(self.buf, self.offset)?;
        self.offset += width;
        Ok(v)
    }

    /// Reads the next type field without advancing.
    pub fn peek_type(&self) -> Result<u32, TlvError> {
        let (v, _) = Self::parse_var(self.buf, self.offset)?;
        u32::try_from(v).map_err(|_| TlvError::WrongType)
    }

    pub fn expect_type(&mut self, typ: u32) -> Result<(), TlvError> {
        if self.get_var()? != typ as u64 {
            return Err(TlvError::WrongType);
        }
        Ok(())
    }

    /// Reads a length field and checks it against the remaining bytes.
    pub fn get_length(&mut self) -> Result<usize, TlvError> {
        let len = usize::try_from(self.get_var()?).map_err(|_| TlvError::Oversize)?;
        if len > self.remaining() {
            return Err(TlvError::Oversize);
        }
        Ok(len)
    }

    pub fn get_bytes(&mut self, n: usize) -> Result<&'a [u8], TlvError> {
        if n > self.remaining() {
            return Err(TlvError::Oversize);
        }
        let bytes = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    /// Reads an `n`-byte NonNegativeInteger value.
    pub fn get_nonneg_int(&mut self, n: usize) -> Result<u64, TlvError> {
        let bytes = self.get_bytes(n)?;
        match n {
            1 => Ok(bytes[0] as u64),
            2 => Ok(u16::from_be_bytes(bytes.try_into().unwrap()) as u64),
            4 => Ok(u32::from_be_bytes(bytes.try_into().unwrap()) as u64),
            8 => Ok(u64::from_be_bytes(bytes.try_into().unwrap())),
            _ => Err(TlvError::WrongType),
        }
    }

    pub fn move_backward(&mut self, n: usize) -> Result<(), TlvError> {
        if n > self.offset {
            return Err(TlvError::Oversize);
        }
        self.offset -= n;
        Ok(())
    }

    fn parse_var(bytes: &[u8], offset: usize) -> Result<(u64, usize), TlvError> {
        if offset >= bytes.len() {
            return Err(TlvError::Oversize);
        }
        let first = bytes[offset];
        match first {
            0..=252 => Ok((first as u64, 1)),
            253 => {
                if offset + 3 > bytes.len() {
                    return Err(TlvError::Oversize);
                }
                let next: [u8; 2] = bytes[offset + 1..offset + 3].try_into().unwrap();
                Ok((u16::from_be_bytes(next) as u64, 3))
            }
            254 => {
                if offset + 5 > bytes.len() {
                    return Err(TlvError::Oversize);
                }
                let next: [u8; 4] = bytes[offset + 1..offset + 5].try_into().unwrap();
                Ok((u32::from_be_bytes(next) as u64, 5))
            }
            255 => {
                if offset + 9 > bytes.len() {
                    return Err(TlvError::Oversize);
                }
                let next: [u8; 8] = bytes[offset + 1..offset + 9].try_into().unwrap();
                Ok((u64::from_be_bytes(next), 9))
            }
        }
    }
}
