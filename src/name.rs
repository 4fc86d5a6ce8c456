use core::num::NonZeroU16;

use crate::tlv::{
    block_size, var_size, Decoder, Encoder, TlvError, TLV_GENERIC_NAME_COMPONENT, TLV_NAME,
};

/// Maximum number of components a name can hold.
pub const NAME_COMPONENTS_MAX: usize = 10;
/// Maximum byte length of a single component value.
pub const NAME_COMPONENT_BUFFER_SIZE: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    /// String form did not start with `/` or held a malformed component.
    InvalidFormat,
    /// Too many components or a component value too long.
    Oversize,
    Tlv(TlvError),
}

impl From<TlvError> for NameError {
    fn from(err: TlvError) -> Self {
        NameError::Tlv(err)
    }
}

#[derive(Copy, Clone)]
pub enum NameComponentType {
    Generic,
    ImplicitSha256Digest,
    ParameterSha256Digest,
    Other(NonZeroU16),
}

const NAME_COMPONENT_TYPE_GENERIC: u16 = TLV_GENERIC_NAME_COMPONENT as u16;
const NAME_COMPONENT_TYPE_IMPLICIT_SHA256: u16 = 1;
const NAME_COMPONENT_TYPE_PARAMETER_SHA256: u16 = 2;

impl From<NonZeroU16> for NameComponentType {
    fn from(value: NonZeroU16) -> Self {
        match value.get() {
            NAME_COMPONENT_TYPE_GENERIC => NameComponentType::Generic,
            NAME_COMPONENT_TYPE_IMPLICIT_SHA256 => NameComponentType::ImplicitSha256Digest,
            NAME_COMPONENT_TYPE_PARAMETER_SHA256 => NameComponentType::ParameterSha256Digest,
            _ => NameComponentType::Other(value),
        }
    }
}

impl From<NameComponentType> for NonZeroU16 {
    fn from(value: NameComponentType) -> Self {
        let raw = match value {
            NameComponentType::Generic => NAME_COMPONENT_TYPE_GENERIC,
            NameComponentType::ImplicitSha256Digest => NAME_COMPONENT_TYPE_IMPLICIT_SHA256,
            NameComponentType::ParameterSha256Digest => NAME_COMPONENT_TYPE_PARAMETER_SHA256,
            NameComponentType::Other(v) => return v,
        };
        match NonZeroU16::new(raw) {
            Some(v) => v,
            None => unreachable!(),
        }
    }
}

/// One name component: a typed, bounded byte string held by value.
#[derive(Copy, Clone)]
pub struct NameComponent {
    typ: NonZeroU16,
    value: [u8; NAME_COMPONENT_BUFFER_SIZE],
    len: usize,
}

impl NameComponent {
    const EMPTY: NameComponent = NameComponent {
        typ: match NonZeroU16::new(NAME_COMPONENT_TYPE_GENERIC) {
            Some(t) => t,
            None => unreachable!(),
        },
        value: [0; NAME_COMPONENT_BUFFER_SIZE],
        len: 0,
    };

    pub fn new(typ: NameComponentType, bytes: &[u8]) -> Result<Self, NameError> {
        if bytes.len() > NAME_COMPONENT_BUFFER_SIZE {
            return Err(NameError::Oversize);
        }
        let mut component = Self::EMPTY;
        component.typ = typ.into();
        component.value[..bytes.len()].copy_from_slice(bytes);
        component.len = bytes.len();
        Ok(component)
    }

    pub fn generic(bytes: &[u8]) -> Result<Self, NameError> {
        Self::new(NameComponentType::Generic, bytes)
    }

    pub fn component_type(&self) -> NameComponentType {
        self.typ.into()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.value[..self.len]
    }

    pub fn encoded_length(&self) -> usize {
        block_size(self.typ.get() as u32, self.len)
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<(), TlvError> {
        enc.put_block(self.typ.get() as u32, self.bytes())
    }
}

impl PartialEq for NameComponent {
    fn eq(&self, other: &Self) -> bool {
        self.typ == other.typ && self.bytes() == other.bytes()
    }
}

impl Eq for NameComponent {}

impl core::fmt::Debug for NameComponent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:", self.typ)?;
        for b in self.bytes() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// An ordered sequence of components with fixed capacity and no heap.
#[derive(Copy, Clone)]
pub struct Name {
    components: [NameComponent; NAME_COMPONENTS_MAX],
    len: usize,
}

impl Name {
    pub const fn new() -> Self {
        Self {
            components: [NameComponent::EMPTY; NAME_COMPONENTS_MAX],
            len: 0,
        }
    }

    /// Parses `/a/b/c` into generic components. The leading `/` is
    /// required; empty segments are skipped.
    pub fn from_string(s: &str) -> Result<Self, NameError> {
        if !s.starts_with('/') {
            return Err(NameError::InvalidFormat);
        }
        let mut name = Self::new();
        for segment in s[1..].split('/') {
            if segment.is_empty() {
                continue;
            }
            name.push(NameComponent::generic(segment.as_bytes())?)?;
        }
        Ok(name)
    }

    pub fn component_count(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components[..self.len].iter()
    }

    pub fn push(&mut self, component: NameComponent) -> Result<(), NameError> {
        if self.len == NAME_COMPONENTS_MAX {
            return Err(NameError::Oversize);
        }
        self.components[self.len] = component;
        self.len += 1;
        Ok(())
    }

    /// Returns a copy of this name with `component` appended.
    pub fn appending(&self, component: NameComponent) -> Result<Self, NameError> {
        let mut name = *self;
        name.push(component)?;
        Ok(name)
    }

    /// True iff `self` is a proper or equal prefix of `other`.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        if self.len > other.len {
            return false;
        }
        self.components[..self.len] == other.components[..self.len]
    }

    fn components_length(&self) -> usize {
        self.components().map(|c| c.encoded_length()).sum()
    }

    pub fn encoded_length(&self) -> usize {
        let components_length = self.components_length();
        var_size(TLV_NAME as u64) + var_size(components_length as u64) + components_length
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<(), TlvError> {
        enc.put_var(TLV_NAME as u64)?;
        enc.put_var(self.components_length() as u64)?;
        for component in self.components() {
            component.encode(enc)?;
        }
        Ok(())
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self, NameError> {
        dec.expect_type(TLV_NAME)?;
        let len = dec.get_length()?;
        let end = dec.offset() + len;

        let mut name = Self::new();
        while dec.offset() < end {
            let typ = dec.get_var()?;
            let typ = u16::try_from(typ)
                .ok()
                .and_then(NonZeroU16::new)
                .ok_or(TlvError::WrongType)?;
            let component_len = dec.get_length()?;
            if dec.offset() + component_len > end {
                return Err(NameError::Tlv(TlvError::WrongType));
            }
            let bytes = dec.get_bytes(component_len)?;
            name.push(NameComponent::new(typ.into(), bytes)?)?;
        }
        Ok(name)
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.components[..self.len] == other.components[..self.len]
    }
}

impl Eq for Name {}

impl core::fmt::Debug for Name {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.components()).finish()
    }
}
