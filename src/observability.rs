use biometrics::{Collector, Counter, Moments};

pub(crate) static TRANSPORT_REQUESTS: Counter = Counter::new("chatwire.transport.requests");
pub(crate) static TRANSPORT_NETWORK_FAILURES: Counter =
    Counter::new("chatwire.transport.network_failures");
pub(crate) static TRANSPORT_UNAUTHORIZED: Counter =
    Counter::new("chatwire.transport.unauthorized");
pub(crate) static TRANSPORT_RETRIES: Counter = Counter::new("chatwire.transport.retries");
pub(crate) static TRANSPORT_REQUEST_DURATION: Moments =
    Moments::new("chatwire.transport.request_duration_seconds");

pub(crate) static AUTH_REFRESHES: Counter = Counter::new("chatwire.auth.refreshes");
pub(crate) static AUTH_REFRESH_FAILURES: Counter = Counter::new("chatwire.auth.refresh_failures");
pub(crate) static AUTH_REFRESH_SHARED: Counter = Counter::new("chatwire.auth.refresh_shared");
pub(crate) static AUTH_LOGIN_REQUIRED: Counter = Counter::new("chatwire.auth.login_required");

pub(crate) static STREAM_FRAMES: Counter = Counter::new("chatwire.stream.frames");
pub(crate) static STREAM_TOKENS: Counter = Counter::new("chatwire.stream.tokens");
pub(crate) static STREAM_KEEPALIVES: Counter = Counter::new("chatwire.stream.keepalives");
pub(crate) static STREAM_DISCARDED_PARTIALS: Counter =
    Counter::new("chatwire.stream.discarded_partials");
pub(crate) static STREAM_BENIGN_CLOSES: Counter = Counter::new("chatwire.stream.benign_closes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatwire.stream.errors");
pub(crate) static STREAM_CANCELLED: Counter = Counter::new("chatwire.stream.cancelled");
pub(crate) static STREAM_DURATION: Moments = Moments::new("chatwire.stream.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&TRANSPORT_REQUESTS);
    collector.register_counter(&TRANSPORT_NETWORK_FAILURES);
    collector.register_counter(&TRANSPORT_UNAUTHORIZED);
    collector.register_counter(&TRANSPORT_RETRIES);
    collector.register_moments(&TRANSPORT_REQUEST_DURATION);

    collector.register_counter(&AUTH_REFRESHES);
    collector.register_counter(&AUTH_REFRESH_FAILURES);
    collector.register_counter(&AUTH_REFRESH_SHARED);
    collector.register_counter(&AUTH_LOGIN_REQUIRED);

    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_TOKENS);
    collector.register_counter(&STREAM_KEEPALIVES);
    collector.register_counter(&STREAM_DISCARDED_PARTIALS);
    collector.register_counter(&STREAM_BENIGN_CLOSES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_CANCELLED);
    collector.register_moments(&STREAM_DURATION);
}
