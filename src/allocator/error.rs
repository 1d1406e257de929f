use ipnet::Ipv4Net;
use thiserror::Error;

/// Result type for allocation operations
pub type AllocationResult<T> = Result<T, AllocationError>;

/// Errors raised while turning a fabric spec into an allocation record.
///
/// Every variant is terminal for the run: allocation is a pure function of
/// the fabric spec, so the same input always reproduces the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// Malformed or missing field in the input document
    #[error("invalid spec field {field}: {reason}")]
    SpecParse { field: String, reason: String },

    /// A pool or identifier range is too small for the requested count
    #[error("{resource} capacity exceeded in {pool}: need {required}, only {available} available")]
    CapacityExceeded {
        resource: &'static str,
        pool: String,
        required: u64,
        available: u64,
    },

    /// Caller-supplied offsets or bases that would structurally collide
    #[error("configuration error in {field}: {reason}")]
    Configuration { field: String, reason: String },

    /// Two entities ended up sharing an address, ASN, VLAN or VNI
    #[error("{resource} {value} assigned to both {first} and {second}")]
    Collision {
        resource: &'static str,
        value: String,
        first: String,
        second: String,
    },

    /// A tenant subnet has no host address left for its gateway
    #[error("zone {zone} subnet {subnet} has no usable host address")]
    SubnetExhaustion { zone: String, subnet: Ipv4Net },
}

impl AllocationError {
    pub fn spec_parse(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpecParse {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn capacity(
        resource: &'static str,
        pool: impl Into<String>,
        required: u64,
        available: u64,
    ) -> Self {
        Self::CapacityExceeded {
            resource,
            pool: pool.into(),
            required,
            available,
        }
    }
}
