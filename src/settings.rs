/// Maximum combined depth of open arrays and structs.
pub const MAX_CONTAINER_DEPTH: u32 = 32;
/// Maximum depth of open dict-entries.
pub const MAX_DICT_ENTRY_DEPTH: u32 = 32;
/// Maximum length of a signature on the wire.
pub const MAX_SIGNATURE_LENGTH: usize = 255;

/// Limits enforced while validating a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSettings {
    max_container_depth: u32,
    max_dict_entry_depth: u32,
    max_length: Option<usize>,
}

impl Default for SignatureSettings {
    fn default() -> Self {
        SignatureSettings {
            max_container_depth: MAX_CONTAINER_DEPTH,
            max_dict_entry_depth: MAX_DICT_ENTRY_DEPTH,
            max_length: Some(MAX_SIGNATURE_LENGTH),
        }
    }
}

impl SignatureSettings {
    pub fn new() -> Self {
        SignatureSettings::default()
    }

    /// Sets the combined bound on open arrays and structs.
    pub fn max_container_depth(mut self, depth: u32) -> Self {
        self.max_container_depth = depth;
        self
    }

    pub fn max_dict_entry_depth(mut self, depth: u32) -> Self {
        self.max_dict_entry_depth = depth;
        self
    }

    /// `None` leaves the length check to whatever transport reads the signature.
    pub fn max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn get_max_container_depth(&self) -> u32 {
        self.max_container_depth
    }

    pub fn get_max_dict_entry_depth(&self) -> u32 {
        self.max_dict_entry_depth
    }

    pub fn get_max_length(&self) -> Option<usize> {
        self.max_length
    }
}
