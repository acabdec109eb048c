//! Ownership of engine results.
//!
//! Every heap pointer inside a result envelope is wrapped in an owning handle
//! as soon as the engine call returns. Handles release their buffer on drop,
//! so each buffer is released exactly once whichever way the conversion ends.
use std::ffi::CStr;
use std::ops::Deref;
use std::os::raw::c_char;
use std::ptr::NonNull;
use std::slice;

use anyhow::bail;
use log::debug;

use crate::errors::{IqTreeError, ProtocolError};
use crate::ffi::{
    DoubleArrayResult, FreeDoubleArrayFn, FreeStringFn, IntegerResult, Releasers, StringResult,
};
use crate::Result;

/// NUL-terminated string allocated by the engine.
pub struct EngineString {
    ptr: NonNull<c_char>,
    release: FreeStringFn,
}

impl EngineString {
    /// # Safety
    /// `ptr` must be null or a NUL-terminated string allocated by the engine
    /// that nothing else owns. `release` must be the engine's matching
    /// release function.
    pub unsafe fn from_raw(ptr: *mut c_char, release: FreeStringFn) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, release })
    }

    pub fn is_empty(&self) -> bool {
        // safety: ptr points to a valid NUL-terminated string
        unsafe { *self.ptr.as_ptr() == 0 }
    }

    pub fn as_c_str(&self) -> &CStr {
        // safety: ptr points to a valid NUL-terminated string owned by self
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    pub fn to_string_lossy(&self) -> String {
        self.as_c_str().to_string_lossy().into_owned()
    }
}

impl Drop for EngineString {
    fn drop(&mut self) {
        // safety: the handle is the only owner of ptr and is dropped once
        unsafe { (self.release)(self.ptr.as_ptr()) }
    }
}

/// Array of doubles allocated by the engine.
pub struct EngineDoubles {
    ptr: NonNull<f64>,
    len: usize,
    release: FreeDoubleArrayFn,
}

impl EngineDoubles {
    /// # Safety
    /// `ptr` must be null or point to `len` initialised doubles allocated by
    /// the engine that nothing else owns. `release` must be the engine's
    /// matching release function.
    pub unsafe fn from_raw(ptr: *mut f64, len: usize, release: FreeDoubleArrayFn) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, len, release })
    }
}

impl Deref for EngineDoubles {
    type Target = [f64];
    fn deref(&self) -> &[f64] {
        // safety: ptr points to len initialised doubles owned by self
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for EngineDoubles {
    fn drop(&mut self) {
        // safety: the handle is the only owner of ptr and is dropped once
        unsafe { (self.release)(self.ptr.as_ptr()) }
    }
}

/// Success payload of an envelope, converted into a host value by copying.
pub trait Payload {
    type Host;
    fn into_host(self) -> Result<Self::Host>;
}

impl Payload for i32 {
    type Host = i32;
    fn into_host(self) -> Result<i32> {
        Ok(self)
    }
}

pub struct StringPayload(Option<EngineString>);

impl Payload for StringPayload {
    type Host = String;
    fn into_host(self) -> Result<String> {
        match self.0 {
            Some(value) => Ok(value.to_string_lossy()),
            None => bail!(ProtocolError::new(
                "Engine returned neither a string result nor an error"
            )),
        }
    }
}

pub struct DoublesPayload {
    buffer: Option<EngineDoubles>,
    length: usize,
}

impl Payload for DoublesPayload {
    type Host = Vec<f64>;
    fn into_host(self) -> Result<Vec<f64>> {
        match self.buffer {
            Some(buffer) => Ok(buffer.to_vec()),
            None if self.length == 0 => Ok(Vec::new()),
            None => bail!(ProtocolError::new(format!(
                "Engine returned a null array of length {}",
                self.length
            ))),
        }
    }
}

/// Outcome of one engine call. Single use: the first [`Envelope::take`]
/// consumes it, later calls fail.
pub struct Envelope<P: Payload> {
    error: Option<EngineString>,
    payload: Option<P>,
    consumed: bool,
}

impl<P: Payload> Envelope<P> {
    fn new(error: Option<EngineString>, payload: P) -> Self {
        Self {
            error,
            payload: Some(payload),
            consumed: false,
        }
    }

    /// True when the error slot holds a non-empty message.
    pub fn is_error(&self) -> bool {
        self.error.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Converts the envelope into a host value.
    ///
    /// A non-empty error slot becomes an [`IqTreeError`] carrying the engine's
    /// message; the payload is then released without being read. An empty
    /// but allocated error string counts as no error.
    pub fn take(&mut self) -> Result<P::Host> {
        if self.consumed {
            bail!(ProtocolError::new("Result envelope has already been converted"));
        }
        self.consumed = true;

        let payload = self.payload.take();
        if let Some(error) = self.error.take() {
            if !error.is_empty() {
                drop(payload);
                bail!(IqTreeError::new(error.to_string_lossy()));
            }
            debug!("Engine allocated an empty error string, treating as success");
        }
        match payload {
            Some(payload) => payload.into_host(),
            None => bail!(ProtocolError::new("Result envelope holds no payload")),
        }
    }

    pub fn into_host(mut self) -> Result<P::Host> {
        self.take()
    }
}

impl IntegerResult {
    /// # Safety
    /// `self` must come straight from an engine call and `releasers` must
    /// belong to the same engine.
    pub unsafe fn into_envelope(self, releasers: Releasers) -> Envelope<i32> {
        Envelope::new(
            EngineString::from_raw(self.error, releasers.free_string),
            self.value,
        )
    }
}

impl StringResult {
    /// # Safety
    /// `self` must come straight from an engine call and `releasers` must
    /// belong to the same engine.
    pub unsafe fn into_envelope(self, releasers: Releasers) -> Envelope<StringPayload> {
        // one owner per pointer, even if the engine aliases both slots
        let value = if self.value == self.error {
            std::ptr::null_mut()
        } else {
            self.value
        };
        Envelope::new(
            EngineString::from_raw(self.error, releasers.free_string),
            StringPayload(EngineString::from_raw(value, releasers.free_string)),
        )
    }
}

impl DoubleArrayResult {
    /// # Safety
    /// `self` must come straight from an engine call and `releasers` must
    /// belong to the same engine.
    pub unsafe fn into_envelope(self, releasers: Releasers) -> Envelope<DoublesPayload> {
        Envelope::new(
            EngineString::from_raw(self.error, releasers.free_string),
            DoublesPayload {
                buffer: EngineDoubles::from_raw(
                    self.value,
                    self.length,
                    releasers.free_double_array,
                ),
                length: self.length,
            },
        )
    }
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
