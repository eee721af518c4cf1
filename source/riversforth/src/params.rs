use serde::{Deserialize, Serialize};

/// Sizing for a [`Forth`](crate::Forth) VM.
///
/// Every field may be omitted when deserializing; missing fields take the
/// default.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default = "Params::default_data_stack_elems")]
    pub data_stack_elems: usize,
    #[serde(default = "Params::default_return_stack_elems")]
    pub return_stack_elems: usize,
    /// Capacity of the dictionary body arena, in cells.
    #[serde(default = "Params::default_dictionary_cells")]
    pub dictionary_cells: usize,
    /// Longest accepted token, in bytes.
    #[serde(default = "Params::default_token_buf_size")]
    pub token_buf_size: usize,
    #[serde(default = "Params::default_output_buf_size")]
    pub output_buf_size: usize,
}

impl Params {
    pub const DEFAULT_DATA_STACK_ELEMS: usize = 100;
    pub const DEFAULT_RETURN_STACK_ELEMS: usize = 1024;
    pub const DEFAULT_DICTIONARY_CELLS: usize = 16384;
    pub const DEFAULT_TOKEN_BUF_SIZE: usize = 64;
    pub const DEFAULT_OUTPUT_BUF_SIZE: usize = 4096;

    const fn default_data_stack_elems() -> usize {
        Self::DEFAULT_DATA_STACK_ELEMS
    }
    const fn default_return_stack_elems() -> usize {
        Self::DEFAULT_RETURN_STACK_ELEMS
    }
    const fn default_dictionary_cells() -> usize {
        Self::DEFAULT_DICTIONARY_CELLS
    }
    const fn default_token_buf_size() -> usize {
        Self::DEFAULT_TOKEN_BUF_SIZE
    }
    const fn default_output_buf_size() -> usize {
        Self::DEFAULT_OUTPUT_BUF_SIZE
    }

    pub const fn new() -> Self {
        Self {
            data_stack_elems: Self::DEFAULT_DATA_STACK_ELEMS,
            return_stack_elems: Self::DEFAULT_RETURN_STACK_ELEMS,
            dictionary_cells: Self::DEFAULT_DICTIONARY_CELLS,
            token_buf_size: Self::DEFAULT_TOKEN_BUF_SIZE,
            output_buf_size: Self::DEFAULT_OUTPUT_BUF_SIZE,
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new()
    }
}
