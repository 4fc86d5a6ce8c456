use crate::name::{NameComponent, NameError};
use crate::tlv::{
    block_size, nonneg_int_block_size, var_size, Decoder, Encoder, TlvError, TLV_META_INFO,
    TLV_META_INFO_CONTENT_TYPE, TLV_META_INFO_FINAL_BLOCK_ID, TLV_META_INFO_FRESHNESS_PERIOD,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Blob,
    Key,
    Link,
    Nack,
    Other(u64),
}

impl From<u64> for ContentType {
    fn from(value: u64) -> Self {
        match value {
            0 => Self::Blob,
            1 => Self::Key,
            2 => Self::Link,
            3 => Self::Nack,
            u => Self::Other(u),
        }
    }
}

impl From<ContentType> for u64 {
    fn from(value: ContentType) -> Self {
        match value {
            ContentType::Blob => 0,
            ContentType::Key => 1,
            ContentType::Link => 2,
            ContentType::Nack => 3,
            ContentType::Other(u) => u,
        }
    }
}

/// Optional metadata carried between the name and the content of a Data
/// packet. The block is always present on the wire, possibly empty.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    pub content_type: Option<ContentType>,
    pub freshness_period: Option<u64>,
    pub final_block_id: Option<NameComponent>,
}

impl MetaInfo {
    pub const fn new() -> Self {
        Self {
            content_type: None,
            freshness_period: None,
            final_block_id: None,
        }
    }

    fn value_length(&self) -> usize {
        let mut len = 0;
        if let Some(content_type) = self.content_type {
            let ct: u64 = content_type.into();
            len += nonneg_int_block_size(TLV_META_INFO_CONTENT_TYPE, ct);
        }
        if let Some(freshness_period) = self.freshness_period {
            len += nonneg_int_block_size(TLV_META_INFO_FRESHNESS_PERIOD, freshness_period);
        }
        if let Some(final_block_id) = &self.final_block_id {
            len += block_size(TLV_META_INFO_FINAL_BLOCK_ID, final_block_id.encoded_length());
        }
        len
    }

    pub fn encoded_length(&self) -> usize {
        let value_length = self.value_length();
        var_size(TLV_META_INFO as u64) + var_size(value_length as u64) + value_length
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<(), TlvError> {
        enc.put_var(TLV_META_INFO as u64)?;
        enc.put_var(self.value_length() as u64)?;
        if let Some(content_type) = self.content_type {
            enc.put_nonneg_int(TLV_META_INFO_CONTENT_TYPE, content_type.into())?;
        }
        if let Some(freshness_period) = self.freshness_period {
            enc.put_nonneg_int(TLV_META_INFO_FRESHNESS_PERIOD, freshness_period)?;
        }
        if let Some(final_block_id) = &self.final_block_id {
            enc.put_var(TLV_META_INFO_FINAL_BLOCK_ID as u64)?;
            enc.put_var(final_block_id.encoded_length() as u64)?;
            final_block_id.encode(enc)?;
        }
        Ok(())
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self, NameError> {
        dec.expect_type(TLV_META_INFO)?;
        let len = dec.get_length()?;
        let end = dec.offset() + len;

        let mut meta_info = Self::new();
        while dec.offset() < end {
            let typ = dec.get_var()?;
            let inner_len = dec.get_length()?;
            if dec.offset() + inner_len > end {
                return Err(NameError::Tlv(TlvError::WrongType));
            }
            match u32::try_from(typ) {
                Ok(TLV_META_INFO_CONTENT_TYPE) => {
                    meta_info.content_type = Some(dec.get_nonneg_int(inner_len)?.into());
                }
                Ok(TLV_META_INFO_FRESHNESS_PERIOD) => {
                    meta_info.freshness_period = Some(dec.get_nonneg_int(inner_len)?);
                }
                Ok(TLV_META_INFO_FINAL_BLOCK_ID) => {
                    let component_typ = dec.get_var()?;
                    let component_typ = u16::try_from(component_typ)
                        .ok()
                        .and_then(core::num::NonZeroU16::new)
                        .ok_or(TlvError::WrongType)?;
                    let component_len = dec.get_length()?;
                    let bytes = dec.get_bytes(component_len)?;
                    meta_info.final_block_id =
                        Some(NameComponent::new(component_typ.into(), bytes)?);
                }
                // Unknown application-defined fields are skipped.
                _ => {
                    dec.get_bytes(inner_len)?;
                }
            }
        }
        Ok(meta_info)
    }
}
