// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::platform::ERROR_INSUFFICIENT_BUFFER;
use crate::RemountError;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum NegotiationError {
    // the platform call failed with something other than ERROR_INSUFFICIENT_BUFFER
    Status(u32),
    // the platform asked for more than `max_len` elements
    TooLarge { required: usize },
    // the single size correction did not satisfy the platform
    NoProgress { required: usize, supplied: usize },
}
impl NegotiationError {
    pub(crate) fn into_remount_error(self, map_status: impl FnOnce(u32) -> RemountError, map_too_large: impl FnOnce(usize) -> RemountError) -> RemountError {
        match self {
            NegotiationError::Status(code) => map_status(code),
            NegotiationError::TooLarge { required } => map_too_large(required),
            NegotiationError::NoProgress { required, supplied } => RemountError::BufferNegotiationFailed { required, supplied },
        }
    }
}

// Runs a "report required size" platform call: `call` receives a buffer and an out-parameter for the required
// size (in elements of T). When the call fails with ERROR_INSUFFICIENT_BUFFER the buffer is grown once to the
// reported size and the call is repeated; a second shortfall is a failure. On success the buffer is returned
// together with the size the platform last reported.
pub(crate) fn negotiate_buffer<T, F>(initial_len: usize, max_len: usize, mut call: F) -> Result<(Vec<T>, usize), NegotiationError>
where
    T: Clone + Default,
    F: FnMut(&mut [T], &mut u32) -> Result<(), u32>,
{
    let mut buffer = vec![T::default(); initial_len.min(max_len)];

    let mut required_size: u32 = 0;
    match call(&mut buffer, &mut required_size) {
        Ok(()) => return Ok((buffer, required_size as usize)),
        Err(ERROR_INSUFFICIENT_BUFFER) => {
            // expected when the initial guess is too small; correct the size once below
        },
        Err(code) => return Err(NegotiationError::Status(code)),
    }

    let required = required_size as usize;
    log::trace!("buffer of {} elements too small; platform requires {}", buffer.len(), required);
    if required > max_len {
        return Err(NegotiationError::TooLarge { required });
    }
    if required <= buffer.len() {
        return Err(NegotiationError::NoProgress { required, supplied: buffer.len() });
    }
    buffer.resize(required, T::default());

    let mut required_size: u32 = 0;
    match call(&mut buffer, &mut required_size) {
        Ok(()) => Ok((buffer, required_size as usize)),
        Err(ERROR_INSUFFICIENT_BUFFER) => Err(NegotiationError::NoProgress { required: required_size as usize, supplied: buffer.len() }),
        Err(code) => Err(NegotiationError::Status(code)),
    }
}
