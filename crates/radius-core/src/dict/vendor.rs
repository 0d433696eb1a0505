use crate::error::RadiusError;

/// Vendor definition.
///
/// Most vendors use the default one-octet type and one-octet length fields
/// for their sub-attributes; a few (e.g. USR, Lucent) use wider type fields
/// or drop the length field entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vendor {
    id: i32,
    name: String,
    type_size: u8,
    length_size: u8,
}

impl Vendor {
    /// Create a vendor with the default 1/1 header format.
    pub fn new(id: i32, name: impl Into<String>) -> Result<Self, RadiusError> {
        Vendor::with_format(id, name, 1, 1)
    }

    /// Create a vendor with an explicit sub-attribute header format.
    ///
    /// `type_size` must be 1, 2 or 4; `length_size` must be 0, 1 or 2.
    pub fn with_format(
        id: i32,
        name: impl Into<String>,
        type_size: u8,
        length_size: u8,
    ) -> Result<Self, RadiusError> {
        let name = name.into();
        if id < 0 {
            return Err(RadiusError::InvalidAttributeValue(format!(
                "vendor id must be positive: {id} ({name})"
            )));
        }
        if name.is_empty() {
            return Err(RadiusError::InvalidAttributeValue(format!(
                "vendor name empty (vendor id {id})"
            )));
        }
        if !matches!(type_size, 1 | 2 | 4) {
            return Err(RadiusError::InvalidAttributeValue(format!(
                "vendor type size must be 1, 2 or 4, got {type_size}"
            )));
        }
        if !matches!(length_size, 0 | 1 | 2) {
            return Err(RadiusError::InvalidAttributeValue(format!(
                "vendor length size must be 0, 1 or 2, got {length_size}"
            )));
        }
        Ok(Vendor {
            id,
            name,
            type_size,
            length_size,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Octets used by the sub-attribute type field.
    pub fn type_size(&self) -> usize {
        self.type_size as usize
    }

    /// Octets used by the sub-attribute length field; 0 means the length is
    /// implicit from the enclosing Vendor-Specific boundary.
    pub fn length_size(&self) -> usize {
        self.length_size as usize
    }

    pub fn header_size(&self) -> usize {
        self.type_size() + self.length_size()
    }

    /// Big-endian encoding of a sub-attribute type code.
    pub fn type_bytes(&self, attr_type: u32) -> Vec<u8> {
        match self.type_size {
            2 => (attr_type as u16).to_be_bytes().to_vec(),
            4 => attr_type.to_be_bytes().to_vec(),
            _ => vec![attr_type as u8],
        }
    }

    /// Big-endian encoding of a sub-attribute length, empty when implicit.
    pub fn length_bytes(&self, len: usize) -> Vec<u8> {
        match self.length_size {
            0 => Vec::new(),
            2 => (len as u16).to_be_bytes().to_vec(),
            _ => vec![len as u8],
        }
    }
}
