use std::ffi::CString;
use std::marker::PhantomData;
use std::os::raw::c_char;

use anyhow::bail;

use crate::errors::ValidationError;
use crate::ffi::{DoubleArray, StringArray};
use crate::Result;

/// Converts one text argument into a NUL-terminated string for the engine.
///
/// # Arguments
/// * `arg` - Argument name, used in the error message.
/// * `text` - The text to convert.
///
/// # Example
/// ```
/// use piqtree::ffi::c_text;
/// assert_eq!(c_text("model", "GTR+F").unwrap().as_bytes(), b"GTR+F");
/// assert!(c_text("model", "GTR\0").is_err());
/// ```
pub fn c_text(arg: &str, text: &str) -> Result<CString> {
    match CString::new(text) {
        Ok(text) => Ok(text),
        Err(e) => bail!(ValidationError::new(format!(
            "Argument '{}' contains a NUL byte at position {}",
            arg,
            e.nul_position()
        ))),
    }
}

/// Read-only view of a sequence of strings in the engine's `StringArray`
/// layout. The view owns the NUL-terminated copies and the pointer table, so
/// the descriptor stays valid for as long as the view is alive.
pub struct StringArrayView {
    _strings: Vec<CString>,
    pointers: Vec<*const c_char>,
    raw: StringArray,
}

impl StringArrayView {
    /// Copies every item once into NUL-terminated storage.
    ///
    /// # Arguments
    /// * `arg` - Argument name, used in error messages.
    /// * `items` - The strings to pass to the engine.
    ///
    /// # Example
    /// ```
    /// use piqtree::ffi::StringArrayView;
    /// let names = StringArrayView::new("names", &["a", "b", "c"]).unwrap();
    /// assert_eq!(names.len(), 3);
    /// ```
    pub fn new<S: AsRef<str>>(arg: &str, items: &[S]) -> Result<Self> {
        let mut strings = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match CString::new(item.as_ref()) {
                Ok(s) => strings.push(s),
                Err(_) => bail!(ValidationError::new(format!(
                    "Element {} of argument '{}' contains a NUL byte",
                    i, arg
                ))),
            }
        }
        let pointers: Vec<*const c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        let raw = StringArray {
            length: pointers.len(),
            strings: pointers.as_ptr(),
        };
        Ok(Self {
            _strings: strings,
            pointers,
            raw,
        })
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    /// Descriptor pointer to hand to the engine. Valid while `self` is alive.
    pub fn as_ptr(&self) -> *const StringArray {
        &self.raw
    }
}

/// Read-only view of a contiguous slice of doubles in the engine's
/// `DoubleArray` layout. Borrows the host slice, no copy is made.
pub struct DoubleArrayView<'a> {
    raw: DoubleArray,
    _data: PhantomData<&'a [f64]>,
}

impl<'a> DoubleArrayView<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        Self {
            raw: DoubleArray {
                length: values.len(),
                doubles: values.as_ptr(),
            },
            _data: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.raw.length
    }

    pub fn is_empty(&self) -> bool {
        self.raw.length == 0
    }

    /// Descriptor pointer to hand to the engine. Valid while `self` is alive.
    pub fn as_ptr(&self) -> *const DoubleArray {
        &self.raw
    }
}
