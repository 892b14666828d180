use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Terminal states (`Completed`, `Failed`) are immutable; every repository
/// mutation carries a status guard so a job never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "gradingjobstatus", rename_all = "lowercase")]
pub(crate) enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::JobStatus;

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Processing).expect("serialize status");
        assert_eq!(json, "\"processing\"");
    }
}
