#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaskError {
    #[error("Seed ({x}, {y}) lies outside of the {width}x{height} image")]
    SeedOutOfBounds {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },
    #[error("Shape mismatch: expected {}x{}, got {}x{}", expected[0], expected[1], actual[0], actual[1])]
    ShapeMismatch {
        expected: [usize; 2],
        actual: [usize; 2],
    },
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("A frame sequence needs at least one frame")]
    EmptySequence,
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("No foreground extractor available")]
    ExtractorUnavailable,
}

impl MaskError {
    pub(crate) fn check_shape(expected: [usize; 2], actual: [usize; 2]) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::ShapeMismatch { expected, actual })
        }
    }
}
