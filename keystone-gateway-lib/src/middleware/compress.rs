use async_compression::tokio::bufread::GzipEncoder;
use async_compression::Level;
use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY};
use http::{HeaderValue, Response};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

use crate::config::CompressionConfig;
use crate::proxy::RespBody;

const ENCODER_CHUNK: usize = 8 * 1024;

/// Gzip the response body when the content type is eligible and the
/// client accepts it. Compression is streaming: chunks are encoded as
/// they arrive, so proxied bodies are never buffered whole.
pub fn maybe_compress(
    resp: Response<RespBody>,
    accept_encoding: Option<&str>,
    cfg: &CompressionConfig,
) -> Response<RespBody> {
    if !cfg.enabled {
        return resp;
    }
    let Some(accept) = accept_encoding else {
        return resp;
    };
    if !accepts_gzip(accept) {
        return resp;
    }
    if resp.headers().contains_key(CONTENT_ENCODING) {
        return resp;
    }
    let eligible = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| cfg.should_compress(ct));
    if !eligible {
        return resp;
    }

    let (mut parts, body) = resp.into_parts();

    let data = body.into_data_stream().map(|r| r.map_err(std::io::Error::other));
    let reader = BufReader::new(StreamReader::new(data));
    let encoder = GzipEncoder::with_quality(reader, Level::Precise(cfg.level as i32));

    parts
        .headers
        .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    // Compressed size is unknown; the server frames the body itself.
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .append(VARY, HeaderValue::from_static("accept-encoding"));

    Response::from_parts(parts, encoder_body(encoder))
}

/// Whether the Accept-Encoding value admits gzip, honouring q-values:
/// "gzip;q=0" does not.
fn accepts_gzip(accept_encoding: &str) -> bool {
    for part in accept_encoding.split(',') {
        let part = part.trim();
        let mut tokens = part.splitn(2, ';');
        let encoding = tokens.next().unwrap_or("").trim().to_ascii_lowercase();

        if encoding != "gzip" && encoding != "*" {
            continue;
        }

        let q: f32 = tokens
            .next()
            .and_then(|params| {
                params.split(';').find_map(|p| {
                    p.trim()
                        .strip_prefix("q=")
                        .and_then(|v| v.trim().parse().ok())
                })
            })
            .unwrap_or(1.0);

        if q > 0.0 {
            return true;
        }
    }
    false
}

/// Turn an AsyncRead encoder into a streaming response body
fn encoder_body<R>(encoder: R) -> RespBody
where
    R: AsyncRead + Send + Sync + 'static,
{
    let encoder = Box::pin(encoder);
    let stream = futures_util::stream::unfold(encoder, |mut enc| async move {
        let mut buf = vec![0u8; ENCODER_CHUNK];
        match enc.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                let frame: std::result::Result<Frame<Bytes>, hyper::Error> =
                    Ok(Frame::data(Bytes::from(buf)));
                Some((frame, enc))
            }
            Err(_) => None,
        }
    });
    BodyExt::boxed(StreamBody::new(stream))
}
