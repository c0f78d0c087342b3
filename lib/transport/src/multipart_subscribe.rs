use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::BoxStream;
use futures_timer::Delay;
use futures_util::{FutureExt, StreamExt};
use tracing::error;

use crate::{codec::encode_result, response::ExecutionResult};

const PART_HEADER: &[u8] = b"--graphql\r\nContent-Type: application/json\r\n\r\n";
const CLOSING_DELIMITER: &[u8] = b"--graphql--\r\n";

/// Frames subscription results as an incremental multipart response
/// (`boundary=graphql`), with an empty `{}` part as heartbeat.
///
/// Read more: https://www.apollographql.com/docs/graphos/routing/operations/subscriptions/multipart-protocol
pub fn create_stream(
    input: BoxStream<'static, ExecutionResult>,
    heartbeat_interval: Duration,
) -> BoxStream<'static, Result<Bytes, std::io::Error>> {
    let mut input = input.fuse();
    let mut heartbeat_timer = Delay::new(heartbeat_interval).fuse();
    async_stream::stream! {
        loop {
            futures_util::select! {
                item = input.next() => {
                    match item {
                        Some(result) => match encode_result(&result) {
                            Ok(encoded) => {
                                yield Ok(Bytes::from_static(PART_HEADER));
                                let mut payload = BytesMut::with_capacity(encoded.len() + 15);
                                payload.put_slice(br#"{"payload":"#);
                                payload.put_slice(&encoded);
                                payload.put_slice(b"}\r\n");
                                yield Ok(payload.freeze());
                            }
                            Err(err) => {
                                error!("Failed to encode subscription result: {}", err);
                                // transport-level error, the subscription ends here
                                yield Ok(Bytes::from_static(PART_HEADER));
                                yield Ok(Bytes::from_static(
                                    br#"{"payload":null,"errors":[{"message":"Failed to encode subscription result"}]}"#,
                                ));
                                yield Ok(Bytes::from_static(b"\r\n"));
                                yield Ok(Bytes::from_static(CLOSING_DELIMITER));
                                break;
                            }
                        },
                        None => {
                            yield Ok(Bytes::from_static(CLOSING_DELIMITER));
                            break;
                        }
                    }
                }
                _ = heartbeat_timer => {
                    heartbeat_timer = Delay::new(heartbeat_interval).fuse();
                    yield Ok(Bytes::from_static(PART_HEADER));
                    yield Ok(Bytes::from_static(b"{}\r\n"));
                }
            }
        }
    }
    .boxed()
}
