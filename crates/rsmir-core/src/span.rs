pub type FileId = u64;

/// Byte range inside a source file. Only carried through for diagnostics and
/// the pretty printer; the builder never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub file: FileId,
    pub lo: u32,
    pub hi: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Span({}:{}-{})", self.file, self.lo, self.hi)
    }
}

impl Span {
    pub const DUMMY: Span = Span {
        file: 0,
        lo: 0,
        hi: 0,
    };

    pub fn new(file: FileId, lo: u32, hi: u32) -> Span {
        Span { file, lo, hi }
    }

    /// Smallest span covering both `self` and `other`. Spans from different
    /// files keep `self`.
    pub fn to(self, other: Span) -> Span {
        if self.file != other.file {
            return self;
        }
        Span {
            file: self.file,
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_merge_within_a_file() {
        let merged = Span::new(3, 10, 12).to(Span::new(3, 4, 11));
        assert_eq!(merged, Span::new(3, 4, 12));
        let other_file = Span::new(3, 10, 12).to(Span::new(4, 0, 1));
        assert_eq!(other_file, Span::new(3, 10, 12));
    }

    #[test]
    fn serializes_as_plain_fields() {
        let json = serde_json::to_value(Span::new(1, 2, 3)).unwrap();
        assert_eq!(json, serde_json::json!({ "file": 1, "lo": 2, "hi": 3 }));
    }
}
