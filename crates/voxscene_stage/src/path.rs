//! Structured scene paths.
//!
//! A path is split into its prim-name segments exactly once, when it is
//! parsed. Everything downstream indexes segments by position instead of
//! slicing the string form.

use std::fmt;

/// An absolute prim path such as `/World/VoxelMap/Chunk_0_0`.
///
/// The empty segment list is the pseudo-root `/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SdfPath {
    segments: Vec<String>,
}

impl SdfPath {
    /// The pseudo-root path `/`.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Builds a path from already-split segments.
    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses an absolute path.
    ///
    /// Property suffixes (`/a/b.prop`) and variant selections (`{v=x}`) are
    /// dropped, keeping only the prim part. Returns `None` for relative or
    /// empty text.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        Self::root().join(rest)
    }

    /// Resolves `text` against `anchor`.
    ///
    /// Absolute text ignores the anchor. Relative text may use `.` and `..`
    /// segments; walking above the pseudo-root yields `None`.
    #[must_use]
    pub fn resolve(anchor: &SdfPath, text: &str) -> Option<Self> {
        let text = text.trim();
        if text.starts_with('/') {
            return Self::parse(text);
        }
        if text.is_empty() {
            return None;
        }
        anchor.join(text)
    }

    fn join(&self, relative: &str) -> Option<Self> {
        let mut segments = self.segments.clone();
        for raw in relative.split('/') {
            let segment = strip_selection(raw);
            let segment = segment.split('.').next().unwrap_or_default();
            match (raw, segment) {
                ("..", _) => {
                    segments.pop()?;
                }
                (".", _) | (_, "") => {}
                (_, name) => segments.push(name.to_string()),
            }
        }
        Some(Self { segments })
    }

    /// Returns true for the pseudo-root.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// All prim-name segments, outermost first.
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segment at `index`, outermost first.
    #[inline]
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// Number of segments.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Trailing segment (the prim name).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path, `None` for the pseudo-root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.segments.split_last()?;
        Some(Self {
            segments: head.to_vec(),
        })
    }

    /// Appends one child segment.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// Returns true if `prefix` is this path or one of its ancestors.
    #[must_use]
    pub fn has_prefix(&self, prefix: &SdfPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Segments below `prefix`, if `prefix` is an ancestor.
    #[must_use]
    pub fn relative_to(&self, prefix: &SdfPath) -> Option<&[String]> {
        self.segments.strip_prefix(prefix.segments.as_slice())
    }

    /// Returns true if any segment equals `name` exactly.
    #[must_use]
    pub fn contains_segment(&self, name: &str) -> bool {
        self.segments.iter().any(|s| s == name)
    }
}

fn strip_selection(raw: &str) -> &str {
    match raw.find('{') {
        Some(open) => &raw[..open],
        None => raw,
    }
}

impl fmt::Display for SdfPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
