//! relaunch-health — health probing for deployment verification.
//!
//! Every check is a bounded poll: probe, and if it fails sleep a fixed
//! interval and try again, up to an attempt ceiling. Sleeping goes through
//! an injectable [`Clock`] so tests can run whole polling windows in
//! virtual time.
//!
//! # Architecture
//!
//! ```text
//! poll_until_healthy(target, PollPolicy, &dyn Clock, probe)
//!   ├── LivenessProbe  (internal, per service)
//!   │   ├── http    → http_probe(url, any 2xx)
//!   │   └── command → exit status 0
//!   └── EndpointProbe  (external, through the ingress)
//!       └── http_probe(url, accepted codes)
//! ```

pub mod checker;
pub mod clock;
pub mod poll;
pub mod probes;

pub use checker::{http_probe, ProbeResult, StatusCheck};
pub use clock::{Clock, ManualClock, SystemClock};
pub use poll::{poll_until_healthy, PollPolicy, PollReport};
pub use probes::{EndpointProbe, HttpEndpointProbe, LivenessProbe, ManifestLiveness};
