//! Borrowed byte views.

use std::ffi::CStr;
use std::fmt;
use std::ops::Deref;

/// A borrowed, zero-copy view over a contiguous byte range.
///
/// `ByteView` is the currency for keys and values. It owns nothing; the
/// lifetime `'a` ties it to whatever produced it (a caller buffer, a string,
/// or a [`crate::Cursor`]), so a view can never outlive its bytes or survive
/// the cursor moving.
///
/// Equality compares contents, not addresses.
///
/// ```rust
/// use xrefdb_core::ByteView;
///
/// let owned = String::from("sym");
/// assert_eq!(ByteView::from(&owned), ByteView::from(b"sym"));
/// assert_eq!(ByteView::from_nul_terminated(b"sym\0garbage").size(), 3);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteView<'a> {
    data: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// Creates a view over `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Creates a view over `data` up to (not including) its first NUL byte.
    ///
    /// Without a NUL the whole slice is viewed.
    #[must_use]
    pub fn from_nul_terminated(data: &'a [u8]) -> Self {
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        Self { data: &data[..len] }
    }

    /// Returns the viewed bytes.
    #[must_use]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the number of viewed bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the view is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resets to the empty view.
    pub fn clear(&mut self) {
        self.data = &[];
    }

    /// Copies the viewed bytes into an owned buffer.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl Deref for ByteView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data
    }
}

impl AsRef<[u8]> for ByteView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}

impl PartialEq<[u8]> for ByteView<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.data == other
    }
}

impl PartialEq<&[u8]> for ByteView<'_> {
    fn eq(&self, other: &&[u8]) -> bool {
        self.data == *other
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for ByteView<'_> {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.data == other.as_slice()
    }
}

impl<'a> From<&'a [u8]> for ByteView<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ByteView<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a Vec<u8>> for ByteView<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a str> for ByteView<'a> {
    fn from(s: &'a str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl<'a> From<&'a String> for ByteView<'a> {
    fn from(s: &'a String) -> Self {
        Self::new(s.as_bytes())
    }
}

impl<'a> From<&'a CStr> for ByteView<'a> {
    fn from(s: &'a CStr) -> Self {
        Self::new(s.to_bytes())
    }
}

impl fmt::Debug for ByteView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b\"{}\"", self.data.escape_ascii())
    }
}
