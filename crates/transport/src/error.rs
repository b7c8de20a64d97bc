use snafu::Snafu;

use crate::ids::StreamTarget;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("endpoint '{endpoint}' is not a valid URL on `{stage}`: {source}"))]
    InvalidEndpoint {
        stage: &'static str,
        endpoint: String,
        source: url::ParseError,
    },
    #[snafu(display("stream request for {target} has an empty message"))]
    EmptyMessage {
        stage: &'static str,
        target: StreamTarget,
    },
    #[snafu(display("failed to open event stream for {target} on `{stage}`: {source}"))]
    OpenStream {
        stage: &'static str,
        target: StreamTarget,
        source: reqwest_eventsource::CannotCloneRequestError,
    },
    #[snafu(display("chat request failed on `{stage}`: {source}"))]
    Request {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("chat endpoint returned status {status}: {body}"))]
    ResponseStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode chat reply on `{stage}`: {source}"))]
    DecodeReply {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type TransportResult<T> = Result<T, TransportError>;
