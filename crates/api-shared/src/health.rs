use crate::dto::HealthRes;

/// Simple health service shared by the REST API and the CLI
///
/// This service provides a standardised way to check the health status of the catalogue.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Catalog is alive".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_health_reports_ok() {
        let res = HealthService::check_health();
        assert!(res.ok);
        assert!(!res.message.is_empty());
    }
}
