// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

// converts a Rust string into a null-terminated utf16 buffer suitable for PCWSTR parameters
// NOTE: the caller must keep the returned vector alive for as long as a pointer to it is in use
pub fn to_utf16_null_terminated(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

#[derive(Debug)]
pub enum Utf16DecodeError {
    MissingTerminator,
    InvalidEncoding(std::string::FromUtf16Error),
}

// decodes the characters up to (but not including) the first null terminator
pub fn from_utf16_null_terminated(buffer: &[u16]) -> Result<String, Utf16DecodeError> {
    let length = match buffer.iter().position(|ch| *ch == 0) {
        Some(value) => value,
        None => return Err(Utf16DecodeError::MissingTerminator),
    };

    String::from_utf16(&buffer[..length]).map_err(Utf16DecodeError::InvalidEncoding)
}

// decodes a null-terminated utf16 string stored as little-endian bytes starting at the given offset
pub fn from_utf16_le_bytes_null_terminated(bytes: &[u8]) -> Result<String, Utf16DecodeError> {
    let chars: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    from_utf16_null_terminated(&chars)
}
