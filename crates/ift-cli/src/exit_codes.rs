//! Process exit codes.
//! Registry failures map through `RegistryError::exit_code`; these cover the rest.

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_INPUT_ERROR: i32 = 1; // Unreadable or malformed input file
pub const EXIT_INTERNAL_ERROR: i32 = 3; // Anything else; never a registry error code
