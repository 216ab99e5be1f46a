use uuid::Uuid;

/// Correlation metadata carried by every lifecycle call and echoed in its log events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationContext {
    pub correlation_id: String,
}

impl OperationContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into() }
    }

    pub fn generate() -> Self {
        Self::new(format!("req-{}", Uuid::new_v4()))
    }

    /// Context for work started by the process itself rather than a caller.
    pub fn system(task: &str) -> Self {
        Self::new(format!("{task}-{}", Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::OperationContext;

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let first = OperationContext::generate();
        let second = OperationContext::generate();
        assert!(first.correlation_id.starts_with("req-"));
        assert_ne!(first, second);
        assert!(OperationContext::system("sweep").correlation_id.starts_with("sweep-"));
    }
}
