pub mod ports;
pub mod lookup_use_case;
pub mod single_flight;

pub use lookup_use_case::{LookupOutcome, LookupSettings, LookupUseCase, RecordSource};
pub use ports::{Admission, CardDataProviderPort, Quota, RateLimiterPort};
