//! Cache key builders for every MediaHub cache entry.
//!
//! Backends add their own namespace prefix (see `RedisCacheConfig::key_prefix`).

/// Serialized base record of a migration report.
pub fn migration_report(migration_id: &str) -> String {
    format!("migration_report_{migration_id}")
}

/// Successful-file counter of a migration report.
pub fn migration_success_count(migration_id: &str) -> String {
    format!("migration_report_{migration_id}:success")
}

/// Failed-file counter of a migration report.
pub fn migration_failure_count(migration_id: &str) -> String {
    format!("migration_report_{migration_id}:failure")
}

/// Per-file failure list of a migration report.
pub fn migration_failures(migration_id: &str) -> String {
    format!("migration_report_{migration_id}:failures")
}

/// Completion timestamp of a migration report, written once.
pub fn migration_completed_at(migration_id: &str) -> String {
    format!("migration_report_{migration_id}:completed_at")
}

/// Index of known migration ids.
pub fn migration_index() -> String {
    "migration_index".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_keys_share_the_report_namespace() {
        let id = "migration_0b1c";
        assert_eq!(migration_report(id), "migration_report_migration_0b1c");
        for key in [
            migration_success_count(id),
            migration_failure_count(id),
            migration_failures(id),
            migration_completed_at(id),
        ] {
            assert!(key.starts_with(&migration_report(id)));
        }
    }
}
