use std::str;

use crate::{Error, Result};

/// Copies the first `length` bytes of a fixed-length foreign character buffer into an owned
/// string.
///
/// Exactly `length` bytes are copied. The buffer is not expected to be terminated and nul bytes
/// inside the range are copied like any other byte. Padding is kept; see [`trim_fixed()`].
///
/// # Errors
///
/// Returns [`Error::LengthOutOfBounds`] if `length` exceeds the buffer, [`Error::Allocation`]
/// if memory for the copy cannot be reserved and [`Error::InvalidUtf8`] if the bytes are not
/// valid UTF-8.
///
/// # Examples
///
/// ```
/// use block_timer::fileio::{to_native_string, trim_fixed};
///
/// let buffer = *b"output/run1    ";
///
/// let name = to_native_string(&buffer, buffer.len()).unwrap();
/// assert_eq!(trim_fixed(&name), "output/run1");
/// ```
pub fn to_native_string(buffer: &[u8], length: usize) -> Result<String> {
    let bytes = buffer.get(..length).ok_or(Error::LengthOutOfBounds {
        length,
        capacity: buffer.len(),
    })?;

    let text = str::from_utf8(bytes).map_err(|source| Error::InvalidUtf8 { source })?;

    let mut owned = String::new();
    owned
        .try_reserve_exact(length)
        .map_err(|source| Error::Allocation { length, source })?;
    owned.push_str(text);

    Ok(owned)
}

/// Strips the trailing blank padding of a fixed-length foreign string.
#[must_use]
pub fn trim_fixed(text: &str) -> &str {
    text.trim_end_matches(' ')
}
