//! Conversion lifecycle stages.

/// Position of a single request inside the conversion pipeline.
///
/// Requests move strictly forward through
/// `Accepted → Sanitized → Rendered → Emitted → Closed`; any stage may instead
/// end in `Failed`, which is only entered after the browser has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStage {
    Accepted,
    Sanitized,
    Rendered,
    Emitted,
    Closed,
    Failed,
}

impl ConversionStage {
    /// Value of the `stage` field on lifecycle log events.
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionStage::Accepted => "accepted",
            ConversionStage::Sanitized => "sanitized",
            ConversionStage::Rendered => "rendered",
            ConversionStage::Emitted => "emitted",
            ConversionStage::Closed => "closed",
            ConversionStage::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_snake_case() {
        let names: Vec<_> = [
            ConversionStage::Accepted,
            ConversionStage::Sanitized,
            ConversionStage::Rendered,
            ConversionStage::Emitted,
            ConversionStage::Closed,
            ConversionStage::Failed,
        ]
        .into_iter()
        .map(ConversionStage::as_str)
        .collect();

        assert_eq!(
            names,
            ["accepted", "sanitized", "rendered", "emitted", "closed", "failed"]
        );
    }
}
