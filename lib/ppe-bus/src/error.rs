use snafu::Snafu;

/// Failure modes surfaced by `Publisher`/`AlertPublisher`. Per the contract,
/// these never propagate into the batcher or the reply path — callers only
/// see them through `publish`'s `bool` return or, for `AlertPublisher`,
/// through its synchronous `Result`.
#[derive(Debug, Snafu)]
pub enum PublishError {
    #[snafu(display("publisher is not connected"))]
    NotConnected,
    #[snafu(display("failed to encode outgoing message: {source}"))]
    Encode { source: ppe_schemas::CodecError },
    #[snafu(display("broker rejected message: {message}"))]
    ConnectionFailed { message: String },
    #[snafu(display("timed out waiting for delivery confirmation"))]
    ConfirmationTimeout,
}

/// Failure modes inside `Consumer::run`'s per-record handling. Handler
/// failures never surface here — they're routed to `Handler::on_error` and
/// the DLQ and the loop continues; only a non-recoverable broker transport
/// failure breaks out of `run`.
#[derive(Debug, Snafu)]
pub enum ConsumeError {
    #[snafu(display("broker transport failure: {message}"))]
    BrokerTransient { message: String },
}
