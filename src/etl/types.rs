use crate::driver::{Domain, DriverError, RegistryError};
use crate::pool::PoolError;

/// Errors that can occur while opening or running a transaction
#[derive(Debug, thiserror::Error)]
pub enum ETLError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{phase} phase failed: {source}")]
    Phase {
        phase: Domain,
        #[source]
        source: DriverError,
    },

    #[error("{0} handle is not open")]
    NotOpened(Domain),

    #[error("{} batch(es) failed", .0.len())]
    Batches(Vec<BatchFailure>),

    /// Extraction failed after some dispatched batches had already failed.
    #[error("extract phase failed: {extract}; {} batch(es) failed", .batches.len())]
    Aborted {
        extract: DriverError,
        batches: Vec<BatchFailure>,
    },

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),
}

impl ETLError {
    pub(crate) fn phase(phase: Domain, source: DriverError) -> Self {
        ETLError::Phase { phase, source }
    }
}

/// A batch whose transform or load failed.
#[derive(Debug)]
pub struct BatchFailure {
    pub offset: u64,
    pub limit: u64,
    pub phase: Domain,
    pub error: DriverError,
}

/// Close outcome of each handle of a transaction.
///
/// A slot is `None` when the handle closed cleanly or was never opened.
#[derive(Debug, Default)]
pub struct CloseErrors {
    pub extract: Option<DriverError>,
    pub transform: Option<DriverError>,
    pub load: Option<DriverError>,
}

impl CloseErrors {
    pub fn is_ok(&self) -> bool {
        self.extract.is_none() && self.transform.is_none() && self.load.is_none()
    }

    /// Failed closes, in extract, transform, load order.
    pub fn errors(&self) -> impl Iterator<Item = (Domain, &DriverError)> {
        [
            (Domain::Extract, self.extract.as_ref()),
            (Domain::Transform, self.transform.as_ref()),
            (Domain::Load, self.load.as_ref()),
        ]
        .into_iter()
        .filter_map(|(domain, error)| error.map(|e| (domain, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ETLError::phase(Domain::Transform, DriverError::message("bad row"));
        assert_eq!(err.to_string(), "transform phase failed: bad row");

        assert_eq!(
            ETLError::NotOpened(Domain::Load).to_string(),
            "load handle is not open"
        );

        let err = ETLError::Batches(vec![BatchFailure {
            offset: 0,
            limit: 10,
            phase: Domain::Load,
            error: DriverError::message("disk full"),
        }]);
        assert_eq!(err.to_string(), "1 batch(es) failed");

        let err = ETLError::Aborted {
            extract: DriverError::message("source unavailable"),
            batches: vec![BatchFailure {
                offset: 0,
                limit: 10,
                phase: Domain::Transform,
                error: DriverError::message("bad row"),
            }],
        };
        assert_eq!(
            err.to_string(),
            "extract phase failed: source unavailable; 1 batch(es) failed"
        );
    }

    #[test]
    fn test_close_errors() {
        let errors = CloseErrors::default();
        assert!(errors.is_ok());
        assert_eq!(errors.errors().count(), 0);

        let errors = CloseErrors {
            extract: Some(DriverError::message("e")),
            transform: None,
            load: Some(DriverError::message("l")),
        };
        assert!(!errors.is_ok());
        let domains: Vec<Domain> = errors.errors().map(|(d, _)| d).collect();
        assert_eq!(domains, vec![Domain::Extract, Domain::Load]);
    }
}
